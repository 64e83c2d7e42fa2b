use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::anomaly::AnomalyDetector;
use crate::auth;
use crate::errors::Result;
use crate::metrics::{
    ACCEPTED_TOTAL, ANOMALIES_TOTAL, AUTH_FAILED_TOTAL, INGEST_LATENCY_SECONDS,
    RATE_LIMITED_TOTAL, READINGS_TOTAL, SMS_FAILURES_TOTAL,
};
use crate::model::{now_ts, AlertType, Reading};
use crate::notify::Notifier;
use crate::ratelimit::RateLimiter;
use crate::store::{AlertStore, DeviceStore, ReadingStore};

/// Terminal outcome of one ingestion attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Throttled,
    Unauthorized,
    Accepted { anomalous: bool, description: String },
}

/// Runs each incoming reading through rate check, auth check, persistence and
/// anomaly check, in that order. Each failing stage is terminal; there is no
/// retry within a request.
pub struct IngestionPipeline<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    limiter: RateLimiter,
    detector: AnomalyDetector,
    anomaly_window: usize,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S, N> IngestionPipeline<S, N>
where
    S: DeviceStore + ReadingStore + AlertStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        limiter: RateLimiter,
        detector: AnomalyDetector,
        anomaly_window: usize,
    ) -> Self {
        Self {
            store,
            notifier,
            limiter,
            detector,
            anomaly_window,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn ingest(
        &self,
        device_id: &str,
        token: &str,
        temperature: f64,
        humidity: f64,
    ) -> Result<Outcome> {
        // All same-device mutations are linearized here; distinct devices
        // hold distinct locks and proceed in parallel.
        let lock = self.device_lock(device_id);
        let _guard = lock.lock().await;

        let start = Instant::now();
        READINGS_TOTAL.inc();
        let now = now_ts();

        // Stage 1: rate check. Applies before auth, so unregistered senders
        // are throttled too.
        if !self.limiter.admit(device_id, now) {
            RATE_LIMITED_TOTAL.inc();
            warn!("Rate limit exceeded for device {}", device_id);
            self.store
                .insert_alert(device_id, AlertType::RateLimit, "rate limit exceeded", now)
                .await?;
            return Ok(Outcome::Throttled);
        }

        // Stage 2: auth check. An unknown device fails verification the same
        // way a bad token does.
        let verified = match self.store.lookup_device(device_id).await? {
            Some(device) => auth::verify(device_id, token, &device.token_hash),
            None => false,
        };
        if !verified {
            AUTH_FAILED_TOTAL.inc();
            warn!("Authentication failed for device {}", device_id);
            self.store
                .insert_alert(
                    device_id,
                    AlertType::AuthFail,
                    "invalid token or unregistered device",
                    now,
                )
                .await?;
            return Ok(Outcome::Unauthorized);
        }

        // Stage 3: persist. Anomalies flag the reading, they never block it.
        let reading = Reading {
            device_id: device_id.to_string(),
            temperature,
            humidity,
            ts: now,
        };
        self.store.insert_reading(&reading).await?;

        // Stage 4: anomaly check. The head row is the reading just written;
        // the baseline is everything after it.
        let recent = self
            .store
            .recent_readings(device_id, (self.anomaly_window + 1) as i64)
            .await?;
        let history: Vec<f64> = recent.iter().skip(1).map(|r| r.temperature).collect();

        let outcome = match self.detector.evaluate(temperature, &history) {
            Some(description) => {
                ANOMALIES_TOTAL.inc();
                warn!("Anomaly on device {}: {}", device_id, description);
                self.store
                    .insert_alert(device_id, AlertType::Anomaly, &description, now)
                    .await?;
                self.notify_detached(device_id, &description);
                Outcome::Accepted {
                    anomalous: true,
                    description,
                }
            }
            None => Outcome::Accepted {
                anomalous: false,
                description: String::new(),
            },
        };

        ACCEPTED_TOTAL.inc();
        INGEST_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
        debug!("Accepted reading from device {}", device_id);
        Ok(outcome)
    }

    /// Fires the notification off the request path. Failures are counted and
    /// logged, never surfaced to the device.
    fn notify_detached(&self, device_id: &str, description: &str) {
        let notifier = self.notifier.clone();
        let text = format!("Anomaly detected on {}: {}", device_id, description);
        tokio::spawn(async move {
            if !notifier.send(&text).await {
                SMS_FAILURES_TOTAL.inc();
                warn!("Anomaly notification failed: {}", text);
            }
        });
    }

    fn device_lock(&self, device_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
