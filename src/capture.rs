//! Capture pipeline: receive loop, record counters, output sink and the
//! throughput reporter that reads the counters.

pub mod capture_loop;
pub mod counters;
pub mod reporter;
pub mod sink;

pub use capture_loop::{CaptureLoop, StopReason};
pub use counters::CaptureCounters;
pub use reporter::ThroughputReporter;
pub use sink::OutputSink;
