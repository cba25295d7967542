use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

// Prometheus metrics (default registry)
pub static COMMANDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "postlink_commands_total",
        "Total commands handled, by command name",
        &["command"]
    )
    .expect("register commands_total")
});

pub static COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "postlink_command_duration_seconds",
        "Command handling duration in seconds",
        &["command"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("register command_duration")
});

pub static CACHE_RELOADS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "postlink_cache_reloads_total",
        "Total full reloads of the link table from its document"
    )
    .expect("register cache_reloads_total")
});

pub static CACHE_RELOAD_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "postlink_cache_reload_failures_total",
        "Total reload attempts that kept the previous table"
    )
    .expect("register cache_reload_failures_total")
});

pub static CACHE_SAVE_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "postlink_cache_save_failures_total",
        "Total writes rolled back because the document could not be saved"
    )
    .expect("register cache_save_failures_total")
});

pub fn encode_metrics() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encode error: {e}"),
        );
    }
    (
        axum::http::StatusCode::OK,
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_output_contains_registered_families() {
        COMMANDS_TOTAL.with_label_values(&["get_post"]).inc();
        CACHE_RELOADS_TOTAL.inc();
        let (status, body) = encode_metrics();
        assert_eq!(status, axum::http::StatusCode::OK);
        assert!(body.contains("postlink_commands_total"));
        assert!(body.contains("postlink_cache_reloads_total"));
    }
}
