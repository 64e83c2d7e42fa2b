use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref READINGS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_readings_total",
        "Total telemetry readings received"
    ))
    .unwrap();
    pub static ref ACCEPTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_accepted_total",
        "Total readings accepted and persisted"
    ))
    .unwrap();
    pub static ref RATE_LIMITED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_rate_limited_total",
        "Total readings rejected by the rate limiter"
    ))
    .unwrap();
    pub static ref AUTH_FAILED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_auth_failed_total",
        "Total readings rejected for bad or missing tokens"
    ))
    .unwrap();
    pub static ref ANOMALIES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_anomalies_total",
        "Total readings flagged as anomalous"
    ))
    .unwrap();
    pub static ref STORE_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_store_failures_total",
        "Total database insert failures"
    ))
    .unwrap();
    pub static ref SMS_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "gateway_sms_failures_total",
        "Total anomaly notifications that failed to send"
    ))
    .unwrap();
    pub static ref INGEST_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "gateway_ingest_latency_seconds",
            "Time taken to run a reading through the ingestion pipeline"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY.register(Box::new(READINGS_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(ACCEPTED_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(RATE_LIMITED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(AUTH_FAILED_TOTAL.clone()))
        .unwrap();
    REGISTRY.register(Box::new(ANOMALIES_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(STORE_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(SMS_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(INGEST_LATENCY_SECONDS.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
