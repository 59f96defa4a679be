//! Pure retry policy: no I/O, no clocks.

mod retry;

pub use retry::{Backoff, is_retriable_status};
