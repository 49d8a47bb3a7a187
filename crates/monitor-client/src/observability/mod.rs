//! Observability for the monitor client.

pub mod metrics;
