use sha2::{Digest, Sha256};
use tracing::info;

use crate::errors::Result;
use crate::model::now_ts;
use crate::oracle::ChainOracle;
use crate::store::DeviceStore;

/// SHA-256 hex digest over `device_id:token`. Deterministic and pure; the
/// raw token is never stored.
pub fn compute_token_hash(device_id: &str, token: &str) -> String {
    let digest = Sha256::digest(format!("{}:{}", device_id, token).as_bytes());
    hex::encode(digest)
}

/// Recomputes the hash from the presented token and compares against the
/// stored value. An unknown device is a negative result, not an error.
pub fn verify(device_id: &str, token: &str, stored_hash: &str) -> bool {
    compute_token_hash(device_id, token) == stored_hash
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    OracleRejected,
}

/// Registers a device: hash the token, consult the on-chain registry, store
/// the hash. An unconfigured oracle passes every device; a configured oracle
/// that errors rejects.
pub async fn register<S, O>(
    store: &S,
    oracle: &O,
    device_id: &str,
    token: &str,
) -> Result<RegisterOutcome>
where
    S: DeviceStore,
    O: ChainOracle,
{
    let token_hash = compute_token_hash(device_id, token);
    if !oracle.verify(device_id, &token_hash).await {
        return Ok(RegisterOutcome::OracleRejected);
    }
    store
        .insert_device(device_id, &token_hash, now_ts())
        .await?;
    info!("Registered device {}", device_id);
    Ok(RegisterOutcome::Registered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::HttpChainOracle;
    use crate::store::memory::MemoryStore;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(
            compute_token_hash("d1", "secret"),
            compute_token_hash("d1", "secret")
        );
    }

    #[test]
    fn test_hash_changes_with_either_input() {
        let base = compute_token_hash("d1", "secret");
        assert_ne!(base, compute_token_hash("d2", "secret"));
        assert_ne!(base, compute_token_hash("d1", "other"));
    }

    #[test]
    fn test_verify_round_trip() {
        let stored = compute_token_hash("d1", "secret");
        assert!(verify("d1", "secret", &stored));
        assert!(!verify("d1", "wrong", &stored));
        assert!(!verify("d2", "secret", &stored));
    }

    #[test]
    fn test_register_without_oracle_always_succeeds() {
        tokio_test::block_on(async {
            let store = MemoryStore::default();
            let oracle = HttpChainOracle::new(None);

            let outcome = register(&store, &oracle, "d1", "secret").await.unwrap();
            assert_eq!(outcome, RegisterOutcome::Registered);

            let device = store.lookup_device("d1").await.unwrap().unwrap();
            assert_eq!(device.token_hash, compute_token_hash("d1", "secret"));
        });
    }
}
