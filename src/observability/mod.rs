//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! staking workflow produces:
//!     → logging.rs (structured log events, one span per workflow)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Workflow ID (UUID v4) flows through every log line of a workflow
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;
