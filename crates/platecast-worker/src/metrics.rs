//! Generation metrics.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub mod names {
    /// Generation attempts by operation and result.
    pub const GENERATION_ATTEMPTS_TOTAL: &str = "platecast_generation_attempts_total";

    /// Finished units by artifact kind and status.
    pub const GENERATION_UNITS_TOTAL: &str = "platecast_generation_units_total";

    /// Outputs rejected by the quality gate.
    pub const QUALITY_REJECTIONS_TOTAL: &str = "platecast_quality_rejections_total";

    /// Units refused by the credit ledger.
    pub const CREDIT_DENIALS_TOTAL: &str = "platecast_credit_denials_total";

    /// Units served from the media cache.
    pub const CACHE_HITS_TOTAL: &str = "platecast_cache_hits_total";
}

/// Install the Prometheus recorder with a scrape endpoint on `port`.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()
}

pub fn record_attempt(operation: &str, result: &'static str) {
    counter!(
        names::GENERATION_ATTEMPTS_TOTAL,
        "operation" => operation.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_unit(kind: &str, status: &'static str) {
    counter!(
        names::GENERATION_UNITS_TOTAL,
        "kind" => kind.to_string(),
        "status" => status
    )
    .increment(1);
}

pub fn record_quality_rejection(kind: &str) {
    counter!(names::QUALITY_REJECTIONS_TOTAL, "kind" => kind.to_string()).increment(1);
}

pub fn record_credit_denial(track: &str) {
    counter!(names::CREDIT_DENIALS_TOTAL, "track" => track.to_string()).increment(1);
}

pub fn record_cache_hit(kind: &str) {
    counter!(names::CACHE_HITS_TOTAL, "kind" => kind.to_string()).increment(1);
}
