use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Histogram, register_counter, register_counter_vec, register_histogram,
};

lazy_static! {
    pub static ref CHECKS_TOTAL: CounterVec = register_counter_vec!(
        "rate_limit_checks_total",
        "Rate limit checks by action and outcome",
        &["action", "outcome"]
    )
    .unwrap();
    pub static ref STORE_ERRORS: Counter =
        register_counter!("rate_limit_store_errors_total", "Failed record store calls").unwrap();
    pub static ref STORE_CONFLICTS: Counter = register_counter!(
        "rate_limit_store_conflicts_total",
        "Record updates lost to a concurrent writer"
    )
    .unwrap();
    pub static ref CHECK_LATENCY: Histogram = register_histogram!(
        "rate_limit_check_latency_seconds",
        "Rate limit check latency in seconds"
    )
    .unwrap();
    pub static ref RECORDS_PRUNED: Counter =
        register_counter!("rate_limit_records_pruned_total", "Stale records deleted").unwrap();
}
