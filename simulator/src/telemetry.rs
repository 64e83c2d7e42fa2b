use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryRequest {
    pub device_id: String,
    pub token: String,
    pub temperature: f64,
    pub humidity: f64,
}
