use lazy_static::lazy_static;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::Once;

static INIT: Once = Once::new();

lazy_static! {
    /// Global Prometheus metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Writer Metrics
    // ============================================================================

    /// Records by final outcome (succeeded, failed, cancelled, too_large)
    pub static ref WRITER_RECORDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("statementlog_writer_records_total", "Records by final outcome"),
        &["stream", "outcome"]
    ).expect("metric can be created");

    /// Records per batch
    pub static ref WRITER_BATCH_SIZE: HistogramVec = HistogramVec::new(
        HistogramOpts::new("statementlog_writer_batch_size", "Writer batch size in records")
            .buckets(vec![1.0, 10.0, 50.0, 100.0, 250.0, 500.0]),
        &["stream"]
    ).expect("metric can be created");

    /// put-records calls, including retries
    pub static ref WRITER_SUBMISSIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("statementlog_writer_submissions_total", "Total put-records calls"),
        &["stream"]
    ).expect("metric can be created");

    /// Records resubmitted after a transient failure
    pub static ref WRITER_RETRIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "statementlog_writer_retries_total",
            "Records resubmitted after transient failures"
        ),
        &["stream"]
    ).expect("metric can be created");

    // ============================================================================
    // Provisioning Metrics
    // ============================================================================

    /// Provisioning attempts by result (ready, created, unavailable)
    pub static ref PROVISION_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("statementlog_provision_total", "Stream provisioning attempts"),
        &["stream", "result"]
    ).expect("metric can be created");
}

/// Initialize metrics registry
/// Can be called multiple times safely (idempotent)
pub fn init() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(WRITER_RECORDS_TOTAL.clone()))
            .expect("writer_records_total can be registered");
        REGISTRY
            .register(Box::new(WRITER_BATCH_SIZE.clone()))
            .expect("writer_batch_size can be registered");
        REGISTRY
            .register(Box::new(WRITER_SUBMISSIONS_TOTAL.clone()))
            .expect("writer_submissions_total can be registered");
        REGISTRY
            .register(Box::new(WRITER_RETRIES_TOTAL.clone()))
            .expect("writer_retries_total can be registered");
        REGISTRY
            .register(Box::new(PROVISION_TOTAL.clone()))
            .expect("provision_total can be registered");
    });
}

/// Count records that reached a final outcome.
pub fn record_outcomes(stream: &str, outcome: &str, count: usize) {
    if count > 0 {
        WRITER_RECORDS_TOTAL
            .with_label_values(&[stream, outcome])
            .inc_by(count as u64);
    }
}

pub fn observe_batch(stream: &str, record_count: usize) {
    WRITER_BATCH_SIZE
        .with_label_values(&[stream])
        .observe(record_count as f64);
}

pub fn record_submission(stream: &str) {
    WRITER_SUBMISSIONS_TOTAL.with_label_values(&[stream]).inc();
}

pub fn record_retries(stream: &str, count: usize) {
    WRITER_RETRIES_TOTAL
        .with_label_values(&[stream])
        .inc_by(count as u64);
}

pub fn record_provision(stream: &str, result: &str) {
    PROVISION_TOTAL.with_label_values(&[stream, result]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcomes_increments() {
        init();
        let before = WRITER_RECORDS_TOTAL
            .with_label_values(&["metrics-test", "succeeded"])
            .get();
        record_outcomes("metrics-test", "succeeded", 3);
        record_outcomes("metrics-test", "succeeded", 0);
        let after = WRITER_RECORDS_TOTAL
            .with_label_values(&["metrics-test", "succeeded"])
            .get();
        assert_eq!(after - before, 3);
    }

    #[test]
    fn test_observe_batch() {
        init();
        observe_batch("metrics-test-batch", 500);
        let count = WRITER_BATCH_SIZE
            .with_label_values(&["metrics-test-batch"])
            .get_sample_count();
        assert!(count >= 1);
    }
}
