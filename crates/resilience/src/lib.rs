// crates/resilience/src/lib.rs
//! Resilience patterns for fault-tolerant RPC calls
//!
//! This module provides:
//! - Retry budgets with exponential backoff (`base^attempt` milliseconds)
//! - Deadlines for async operations
//!
//! # Example
//!
//! ```rust
//! use vaultsync_resilience::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(5).with_base(4);
//! assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(16));
//! ```

mod error;
mod retry;
mod timeout;

pub use error::{ResilienceError, ResilienceResult};
pub use retry::RetryPolicy;
pub use timeout::with_timeout;
