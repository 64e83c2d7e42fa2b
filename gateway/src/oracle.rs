use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::OracleConfig;

/// External verification service consulted at registration time.
#[async_trait]
pub trait ChainOracle: Send + Sync {
    async fn verify(&self, device_id: &str, token_hash: &str) -> bool;
}

/// Registry-contract lookup over HTTP RPC. Deployments without
/// `BLOCKCHAIN_RPC`/`CONTRACT_ADDRESS` pass every device; once configured,
/// any transport or decode error rejects.
pub struct HttpChainOracle {
    config: Option<OracleConfig>,
    client: reqwest::Client,
}

impl HttpChainOracle {
    pub fn new(config: Option<OracleConfig>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    contract: &'a str,
    device_id: &'a str,
    token_hash: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verified: bool,
}

#[async_trait]
impl ChainOracle for HttpChainOracle {
    async fn verify(&self, device_id: &str, token_hash: &str) -> bool {
        let Some(config) = &self.config else {
            return true;
        };

        let request = VerifyRequest {
            contract: &config.contract_address,
            device_id,
            token_hash,
        };
        let response = match self.client.post(&config.rpc_url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("On-chain verify request failed: {}", e);
                return false;
            }
        };
        match response.error_for_status() {
            Ok(response) => match response.json::<VerifyResponse>().await {
                Ok(body) => body.verified,
                Err(e) => {
                    error!("On-chain verify response malformed: {}", e);
                    false
                }
            },
            Err(e) => {
                error!("On-chain verify rejected: {}", e);
                false
            }
        }
    }
}
