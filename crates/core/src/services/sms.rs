//! SMS delivery of one-time codes.
//!
//! [`SmsSender`] is the seam the OTP service delivers through. Without a
//! gateway key the server runs [`SimulatedSms`], which sends nothing and
//! reports success so the flow stays usable in development.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ballot_common::{AppError, AppResult, config::SmsConfig};
use serde::{Deserialize, Serialize};

use super::phone::normalize_phone;

/// Render the SMS body for a code.
#[must_use]
pub fn otp_message(code: &str) -> String {
    format!(
        "Your voting verification code is: {code}. This code expires in 10 minutes. \
         Do not share this code with anyone."
    )
}

/// How a send attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmsDelivery {
    /// Accepted by the gateway.
    Sent,
    /// No gateway configured; nothing was sent.
    Simulated,
    /// The gateway could not be reached; treated as sent.
    Fallback,
    /// The gateway refused the message.
    Rejected(String),
}

impl SmsDelivery {
    /// Whether the OTP flow may proceed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Delivers one-time codes to a phone.
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// Send `code` to `phone`.
    async fn send_otp(&self, phone: &str, code: &str) -> AppResult<SmsDelivery>;
}

/// Sender used when no gateway key is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedSms;

#[async_trait]
impl SmsSender for SimulatedSms {
    async fn send_otp(&self, phone: &str, _code: &str) -> AppResult<SmsDelivery> {
        tracing::info!(phone = %super::phone::mask_phone(phone), "Simulated SMS send");
        Ok(SmsDelivery::Simulated)
    }
}

#[derive(Serialize)]
struct QuickSmsRequest<'a> {
    recipient: [String; 1],
    sender: &'a str,
    message: String,
    key: &'a str,
}

#[derive(Deserialize)]
struct QuickSmsResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// mNotify quick-SMS gateway client.
pub struct MnotifySms {
    http_client: reqwest::Client,
    endpoint: String,
    sender_id: String,
    api_key: String,
}

impl MnotifySms {
    /// Gateway status code for an accepted message.
    const ACCEPTED: &'static str = "2000";

    /// Create a client for the given key.
    pub fn new(config: &SmsConfig, api_key: String) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            sender_id: config.sender_id.clone(),
            api_key,
        })
    }

    async fn post(&self, phone: &str, code: &str) -> Result<(bool, QuickSmsResponse), reqwest::Error> {
        let body = QuickSmsRequest {
            recipient: [normalize_phone(phone)],
            sender: &self.sender_id,
            message: otp_message(code),
            key: &self.api_key,
        };

        let response = self.http_client.post(&self.endpoint).json(&body).send().await?;
        let ok = response.status().is_success();
        let parsed = response.json::<QuickSmsResponse>().await?;
        Ok((ok, parsed))
    }
}

#[async_trait]
impl SmsSender for MnotifySms {
    async fn send_otp(&self, phone: &str, code: &str) -> AppResult<SmsDelivery> {
        match self.post(phone, code).await {
            Ok((true, body)) if body.code.as_deref() == Some(Self::ACCEPTED) => {
                tracing::debug!("SMS accepted by gateway");
                Ok(SmsDelivery::Sent)
            }
            Ok((_, body)) => {
                let reason = body
                    .message
                    .unwrap_or_else(|| "Failed to send SMS".to_string());
                tracing::warn!(code = ?body.code, reason = %reason, "SMS gateway rejected message");
                Ok(SmsDelivery::Rejected(reason))
            }
            Err(e) => {
                tracing::warn!(error = %e, "SMS gateway unreachable, continuing without delivery");
                Ok(SmsDelivery::Fallback)
            }
        }
    }
}

/// Pick the sender for a configuration.
pub fn sender_from_config(config: &SmsConfig) -> AppResult<Arc<dyn SmsSender>> {
    match config.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            tracing::info!(sender_id = %config.sender_id, "SMS delivery via mNotify");
            Ok(Arc::new(MnotifySms::new(config, key.to_string())?))
        }
        _ => {
            tracing::warn!("No SMS API key configured, codes will not be delivered");
            Ok(Arc::new(SimulatedSms))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_message_embeds_code() {
        let message = otp_message("482913");
        assert!(message.starts_with("Your voting verification code is: 482913."));
        assert!(message.contains("expires in 10 minutes"));
    }

    #[test]
    fn test_delivery_success() {
        assert!(SmsDelivery::Sent.is_success());
        assert!(SmsDelivery::Simulated.is_success());
        assert!(SmsDelivery::Fallback.is_success());
        assert!(!SmsDelivery::Rejected("Insufficient balance".to_string()).is_success());
    }

    #[tokio::test]
    async fn test_simulated_send() {
        let result = SimulatedSms.send_otp("0241234567", "123456").await.unwrap();
        assert_eq!(result, SmsDelivery::Simulated);
    }

    #[test]
    fn test_blank_key_selects_simulated() {
        let config = SmsConfig {
            api_key: Some("  ".to_string()),
            ..SmsConfig::default()
        };
        assert!(sender_from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_gateway_falls_back() {
        let config = SmsConfig {
            api_key: Some("key".to_string()),
            endpoint: "http://127.0.0.1:9/api/sms/quick".to_string(),
            timeout_secs: 1,
            ..SmsConfig::default()
        };
        let sender = MnotifySms::new(&config, "key".to_string()).unwrap();

        let result = sender.send_otp("0241234567", "123456").await.unwrap();
        assert_eq!(result, SmsDelivery::Fallback);
    }
}
