//! Pathway Testing Framework
//!
//! Provides a handler kit and mock upstreams for testing pipelines and
//! gateways without live API calls.

pub mod handlers;
pub mod upstream;

pub use handlers::{test_registry, Echo, Fail, FixedCost, Upper};
pub use upstream::spawn_upstream;
