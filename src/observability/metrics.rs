//! Metrics collection.
//!
//! # Metrics
//! - `registry_requests_total` (counter): dispatches by method, including resubmissions
//! - `registry_settled_total` (counter): terminal outcomes by `outcome` label
//! - `registry_superseded_total` (counter): records evicted by single-flight submissions
//! - `registry_unauthorized_held` (gauge): records currently held as unauthorized
//! - `registry_request_duration_seconds` (histogram): transport latency per attempt
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - No-ops until the application installs a recorder

use std::time::Duration;

/// Record a dispatch to the transport.
pub fn record_dispatch(method: &str) {
    metrics::counter!("registry_requests_total", "method" => method.to_string()).increment(1);
}

/// Record a terminal outcome.
///
/// One of `resolved`, `rejected`, `released`, `discarded`, `raw_resolved` or `raw_rejected`.
pub fn record_settled(outcome: &'static str) {
    metrics::counter!("registry_settled_total", "outcome" => outcome).increment(1);
}

/// Record a single-flight eviction.
pub fn record_superseded() {
    metrics::counter!("registry_superseded_total").increment(1);
}

/// Record the number of records held as unauthorized.
pub fn record_unauthorized_held(count: usize) {
    metrics::gauge!("registry_unauthorized_held").set(count as f64);
}

/// Record how long one transport attempt took.
pub fn record_duration(elapsed: Duration) {
    metrics::histogram!("registry_request_duration_seconds").record(elapsed.as_secs_f64());
}
