use async_trait::async_trait;

use crate::errors::Result;
use crate::model::{AlertType, Device, Reading};

/// Persistence for device registrations.
#[async_trait]
pub trait DeviceStore: Send + Sync {
    async fn lookup_device(&self, device_id: &str) -> Result<Option<Device>>;
    async fn insert_device(
        &self,
        device_id: &str,
        token_hash: &str,
        registered_at: i64,
    ) -> Result<()>;
}

/// Persistence for sensor readings. `recent_readings` returns newest first,
/// ordered by timestamp then insertion order.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn insert_reading(&self, reading: &Reading) -> Result<()>;
    async fn recent_readings(&self, device_id: &str, limit: i64) -> Result<Vec<Reading>>;
}

/// Persistence for alert records.
#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn insert_alert(
        &self,
        device_id: &str,
        alert_type: AlertType,
        description: &str,
        ts: i64,
    ) -> Result<()>;
}
