use lazy_static::lazy_static;
use prometheus::{
    Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram,
};

lazy_static! {
    pub static ref ALERT_REQUESTS: Counter =
        register_counter!("healix_alert_requests_total", "Total emergency alert requests").unwrap();
    pub static ref ALERTS_REJECTED: Counter = register_counter!(
        "healix_alert_rejected_total",
        "Alert requests rejected before dispatch"
    )
    .unwrap();
    pub static ref ALERTS_RATE_LIMITED: Counter = register_counter!(
        "healix_alert_rate_limited_total",
        "Alert requests denied by the rate limiter"
    )
    .unwrap();
    pub static ref SMS_SENT: Counter =
        register_counter!("healix_alert_sms_sent_total", "Alert SMS accepted by the provider").unwrap();
    pub static ref CALLS_PLACED: Counter =
        register_counter!("healix_alert_calls_placed_total", "Alert calls accepted by the provider").unwrap();
    pub static ref PROVIDER_FAILURES: Counter = register_counter!(
        "healix_alert_provider_failures_total",
        "Provider calls that failed"
    )
    .unwrap();
    pub static ref DISPATCH_LATENCY: Histogram = register_histogram!(
        "healix_alert_dispatch_latency_seconds",
        "Time spent in provider calls per alert"
    )
    .unwrap();
    pub static ref RATE_LIMIT_ENTRIES: Gauge = register_gauge!(
        "healix_alert_rate_limit_entries",
        "Identifiers currently tracked by the rate limiter"
    )
    .unwrap();
}
