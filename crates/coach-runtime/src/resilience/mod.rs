//! Resilience patterns for coach-runtime.
//!
//! Upstream rate limits are the only throttle in the system: there is no
//! local admission control, so retries must stay bounded.

mod retry;

pub use retry::{with_retries, RetryError, RetryPolicy, Retryable};
