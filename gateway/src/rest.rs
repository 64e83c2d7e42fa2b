use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::error;

use crate::auth::{self, RegisterOutcome};
use crate::db::PgStore;
use crate::errors::Error;
use crate::model::{now_ts, Alert, DeviceSummary, ReadingSample};
use crate::notify::SmsNotifier;
use crate::oracle::HttpChainOracle;
use crate::pipeline::{IngestionPipeline, Outcome};
use crate::validate::validate;

pub type GatewayPipeline = IngestionPipeline<PgStore, SmsNotifier>;

#[derive(Clone)]
struct AppState {
    pool: PgPool,
    pipeline: Arc<GatewayPipeline>,
    store: Arc<PgStore>,
    oracle: Arc<HttpChainOracle>,
}

pub fn create_router(
    pool: PgPool,
    pipeline: Arc<GatewayPipeline>,
    store: Arc<PgStore>,
    oracle: Arc<HttpChainOracle>,
) -> Router {
    let state = AppState {
        pool,
        pipeline,
        store,
        oracle,
    };

    Router::new()
        .route("/", get(health))
        .route("/register", post(register))
        .route("/data", post(ingest_data))
        .route("/devices", get(list_devices))
        .route("/alerts", get(list_alerts))
        .route("/latest/:device_id", get(latest_readings))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true, "timestamp": now_ts() }))
}

async fn register(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(device_id), Some(token)) = (string_field(&body, "device_id"), string_field(&body, "token"))
    else {
        return Err(ApiError::Validation(
            "device_id and token required".to_string(),
        ));
    };

    match auth::register(state.store.as_ref(), state.oracle.as_ref(), device_id, token).await? {
        RegisterOutcome::Registered => Ok((
            StatusCode::CREATED,
            Json(json!({ "registered": true, "device_id": device_id })),
        )),
        RegisterOutcome::OracleRejected => Err(ApiError::OracleRejected),
    }
}

async fn ingest_data(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let temperature = body.get("temperature").and_then(numeric_field);
    let humidity = body.get("humidity").and_then(numeric_field);
    let (Some(temperature), Some(humidity)) = (temperature, humidity) else {
        return Err(ApiError::Validation(
            "temperature and humidity numeric required".to_string(),
        ));
    };

    let (Some(device_id), Some(token)) = (string_field(&body, "device_id"), string_field(&body, "token"))
    else {
        return Err(ApiError::Unauthenticated);
    };

    validate(device_id, temperature, humidity)?;

    match state
        .pipeline
        .ingest(device_id, token, temperature, humidity)
        .await?
    {
        Outcome::Throttled => Err(ApiError::RateLimited),
        Outcome::Unauthorized => Err(ApiError::Unauthorized),
        Outcome::Accepted {
            anomalous,
            description,
        } => Ok(Json(
            json!({ "ok": true, "anomaly": anomalous, "desc": description }),
        )),
    }
}

async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceSummary>>, ApiError> {
    let devices = sqlx::query_as::<_, DeviceSummary>(
        "SELECT device_id, registered_at FROM devices ORDER BY registered_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(devices))
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<i64>,
}

async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let limit = params.limit.unwrap_or(200).clamp(1, 1000);
    let alerts = sqlx::query_as::<_, Alert>(
        "SELECT device_id, alert_type, description, ts FROM alerts
         ORDER BY ts DESC, id DESC
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(alerts))
}

async fn latest_readings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<ReadingSample>>, ApiError> {
    let limit = params.limit.unwrap_or(100).clamp(1, 1000);
    let readings = sqlx::query_as::<_, ReadingSample>(
        "SELECT temperature, humidity, ts FROM readings
         WHERE device_id = $1
         ORDER BY ts DESC, id DESC
         LIMIT $2",
    )
    .bind(&device_id)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;
    Ok(Json(readings))
}

fn string_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Accepts JSON numbers and numeric strings, matching what devices actually
/// send.
fn numeric_field(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

enum ApiError {
    Validation(String),
    Unauthenticated,
    Unauthorized,
    OracleRejected,
    RateLimited,
    Internal(anyhow::Error),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(msg) => ApiError::Validation(msg),
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "auth required".to_string()),
            ApiError::Unauthorized => (StatusCode::FORBIDDEN, "unauthorized".to_string()),
            ApiError::OracleRejected => (
                StatusCode::FORBIDDEN,
                "device not registered on-chain".to_string(),
            ),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_string(),
            ),
            ApiError::Internal(err) => {
                error!("API error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_field_accepts_numbers_and_strings() {
        assert_eq!(numeric_field(&json!(25.5)), Some(25.5));
        assert_eq!(numeric_field(&json!(25)), Some(25.0));
        assert_eq!(numeric_field(&json!("25.5")), Some(25.5));
        assert_eq!(numeric_field(&json!(" 25.5 ")), Some(25.5));
        assert_eq!(numeric_field(&json!("abc")), None);
        assert_eq!(numeric_field(&json!(null)), None);
        assert_eq!(numeric_field(&json!([1.0])), None);
    }

    #[test]
    fn test_string_field_rejects_empty_and_non_strings() {
        let body = json!({ "device_id": "d1", "empty": "", "num": 3 });
        assert_eq!(string_field(&body, "device_id"), Some("d1"));
        assert_eq!(string_field(&body, "empty"), None);
        assert_eq!(string_field(&body, "num"), None);
        assert_eq!(string_field(&body, "missing"), None);
    }
}
