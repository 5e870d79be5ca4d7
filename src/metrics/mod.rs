//! Prometheus metrics for the relay: inbound traffic, upstream calls and
//! token refreshes.

mod recorder;

pub use recorder::{Metrics, MetricsRecorder};
