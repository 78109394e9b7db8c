//! Observability infrastructure - engine metrics

mod metrics;

pub use self::metrics::{record_pass, PassMetrics};
