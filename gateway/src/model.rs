use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Unix seconds, assigned by the server at ingestion and registration time.
pub fn now_ts() -> i64 {
    Utc::now().timestamp()
}

/// A registered telemetry source. Insert-only, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub device_id: String,
    pub token_hash: String,
    pub registered_at: i64,
}

/// One telemetry sample from a device.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    pub device_id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertType {
    RateLimit,
    AuthFail,
    Anomaly,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::RateLimit => "rate_limit",
            AlertType::AuthFail => "auth_fail",
            AlertType::Anomaly => "anomaly",
        }
    }
}

/// Record of an exceptional ingestion event, written only by the pipeline.
/// Serializes with the short field names the alert listing exposes.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Alert {
    pub device_id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    #[serde(rename = "desc")]
    pub description: String,
    pub ts: i64,
}

/// Row shape for `GET /devices`; deliberately omits the token hash.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DeviceSummary {
    pub device_id: String,
    pub registered_at: i64,
}

/// Row shape for `GET /latest/:device_id`.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ReadingSample {
    pub temperature: f64,
    pub humidity: f64,
    pub ts: i64,
}
