use lazy_static::lazy_static;
use prometheus::{
    CounterVec, GaugeVec, HistogramVec, register_counter_vec, register_gauge_vec,
    register_histogram_vec,
};

// Every metric is labelled by limiter name so several limiters can share a process
lazy_static! {
    pub static ref CHECKS_TOTAL: CounterVec = register_counter_vec!(
        "admission_checks_total",
        "Total number of admission checks",
        &["limiter"]
    )
    .unwrap();
    pub static ref ALLOWED_TOTAL: CounterVec = register_counter_vec!(
        "admission_allowed_total",
        "Admission checks that were allowed",
        &["limiter"]
    )
    .unwrap();
    pub static ref DENIED_TOTAL: CounterVec = register_counter_vec!(
        "admission_denied_total",
        "Admission checks that were denied",
        &["limiter"]
    )
    .unwrap();
    pub static ref INVALID_KEYS_TOTAL: CounterVec = register_counter_vec!(
        "admission_invalid_keys_total",
        "Admission checks rejected for an empty key",
        &["limiter"]
    )
    .unwrap();
    pub static ref EVICTED_TOTAL: CounterVec = register_counter_vec!(
        "admission_buckets_evicted_total",
        "Idle buckets removed by the sweep",
        &["limiter"]
    )
    .unwrap();
    pub static ref RESETS_TOTAL: CounterVec = register_counter_vec!(
        "admission_bucket_resets_total",
        "Buckets reset to full after an out-of-range token count",
        &["limiter"]
    )
    .unwrap();
    pub static ref BUCKETS_TRACKED: GaugeVec = register_gauge_vec!(
        "admission_buckets_tracked",
        "Current number of buckets held in memory",
        &["limiter"]
    )
    .unwrap();
    pub static ref CHECK_LATENCY: HistogramVec = register_histogram_vec!(
        "admission_check_duration_seconds",
        "Time spent deciding an admission check",
        &["limiter"]
    )
    .unwrap();
}
