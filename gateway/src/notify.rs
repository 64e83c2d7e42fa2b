use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::TwilioConfig;

/// Best-effort notification channel. A false return is logged by the caller
/// and never propagated.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> bool;
}

/// SMS via the Twilio REST API. Skips sending when credentials are absent.
pub struct SmsNotifier {
    config: Option<TwilioConfig>,
    client: reqwest::Client,
}

impl SmsNotifier {
    pub fn new(config: Option<TwilioConfig>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(&self, text: &str) -> bool {
        let Some(config) = &self.config else {
            info!("Twilio credentials not configured, skipping SMS");
            return false;
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            config.account_sid
        );
        let params = [
            ("To", config.admin_phone.as_str()),
            ("From", config.from.as_str()),
            ("Body", text),
        ];
        match self
            .client
            .post(&url)
            .basic_auth(&config.account_sid, Some(&config.auth_token))
            .form(&params)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!("SMS send rejected with status {}", response.status());
                false
            }
            Err(e) => {
                warn!("SMS send failed: {}", e);
                false
            }
        }
    }
}
