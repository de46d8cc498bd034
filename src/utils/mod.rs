//! # Utility Modules
//!
//! Supporting utilities shared by the models and the reference transport.
//!
//! ## Components
//! - **Logging**: tracing-subscriber setup from [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: thread-safe counters for requests, replies and transfer outcomes

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
