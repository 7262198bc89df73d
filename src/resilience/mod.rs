//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the ledger:
//!     → timeouts.rs (every RPC call has a deadline)
//!     → retries.rs (bounded retry, stop on success predicate)
//!     → backoff.rs (constant or exponential delay between attempts)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retry budgets are always finite; exhaustion is a typed error
//! - Only transient errors are retried; permanent ones abort immediately

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::{calculate_backoff, BackoffPolicy};
pub use retries::{retry, RetryError, RetryPolicy, Transient};
pub use timeouts::with_timeout;
