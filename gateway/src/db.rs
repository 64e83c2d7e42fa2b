use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{error, info, warn};

use crate::errors::{Error, Result};
use crate::metrics::STORE_FAILURES_TOTAL;
use crate::model::{AlertType, Device, Reading};
use crate::store::{AlertStore, DeviceStore, ReadingStore};

pub async fn make_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// Postgres-backed device, reading and alert persistence.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceStore for PgStore {
    async fn lookup_device(&self, device_id: &str) -> Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            "SELECT device_id, token_hash, registered_at FROM devices WHERE device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(device)
    }

    async fn insert_device(
        &self,
        device_id: &str,
        token_hash: &str,
        registered_at: i64,
    ) -> Result<()> {
        insert_with_retry(move || async move {
            sqlx::query(
                "INSERT INTO devices (device_id, token_hash, registered_at)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (device_id) DO NOTHING",
            )
            .bind(device_id)
            .bind(token_hash)
            .bind(registered_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        insert_with_retry(move || async move {
            sqlx::query(
                "INSERT INTO readings (device_id, temperature, humidity, ts)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(&reading.device_id)
            .bind(reading.temperature)
            .bind(reading.humidity)
            .bind(reading.ts)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn recent_readings(&self, device_id: &str, limit: i64) -> Result<Vec<Reading>> {
        let readings = sqlx::query_as::<_, Reading>(
            "SELECT device_id, temperature, humidity, ts FROM readings
             WHERE device_id = $1
             ORDER BY ts DESC, id DESC
             LIMIT $2",
        )
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(readings)
    }
}

#[async_trait]
impl AlertStore for PgStore {
    async fn insert_alert(
        &self,
        device_id: &str,
        alert_type: AlertType,
        description: &str,
        ts: i64,
    ) -> Result<()> {
        insert_with_retry(move || async move {
            sqlx::query(
                "INSERT INTO alerts (device_id, alert_type, description, ts)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(device_id)
            .bind(alert_type.as_str())
            .bind(description)
            .bind(ts)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }
}

async fn insert_with_retry<F, Fut>(op: F) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut attempts = 0;
    let max_attempts = 5;

    loop {
        attempts += 1;
        match op().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                let transient = matches!(&e, Error::Database(db_err) if is_transient_error(db_err));
                if attempts >= max_attempts || !transient {
                    error!(
                        "Database insert failed permanently after {} attempts: {}",
                        attempts, e
                    );
                    return Err(e);
                }

                let wait_ms = 100 * 2_u64.pow(attempts - 1).min(32);
                warn!(
                    "Database insert failed (attempt {}/{}), retrying in {}ms: {}",
                    attempts, max_attempts, wait_ms, e
                );
                STORE_FAILURES_TOTAL.inc();
                tokio::time::sleep(Duration::from_millis(wait_ms)).await;
            }
        }
    }
}

fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => {
            // Connection-related SQLSTATE classes only
            db_err.code().is_some_and(|code| {
                code == "08000" || // connection_exception
                code == "08003" || // connection_does_not_exist
                code == "08006" || // connection_failure
                code == "57P03" || // cannot_connect_now
                code == "53300" // too_many_connections
            })
        }
        _ => false,
    }
}
