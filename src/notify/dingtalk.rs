use super::payload::Payload;
use crate::config::ReliabilityConfig;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::time::{self, Duration};

type HmacSha256 = Hmac<Sha256>;

/// Robot API error code for a message body over the size limit.
const ERR_CONTENT_TOO_LONG: i64 = 460_101;

#[derive(Debug, serde::Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

#[derive(Debug, thiserror::Error)]
enum DeliveryError {
    #[error("webhook returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("webhook error {errcode}: {errmsg}")]
    Envelope { errcode: i64, errmsg: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Payload transform to apply before the next retry for a distinguished
/// webhook error code, if any.
fn transform_for(errcode: i64) -> Option<fn(&mut Payload)> {
    match errcode {
        ERR_CONTENT_TOO_LONG => Some(Payload::shrink),
        _ => None,
    }
}

/// DingTalk group-robot webhook client. Delivery is best-effort: bounded
/// retries with fixed backoff, then a silent give-up.
pub struct DingTalkNotifier {
    webhook: String,
    secret: Option<String>,
    attempts: u32,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl DingTalkNotifier {
    pub fn new(webhook: String, secret: Option<String>, reliability: &ReliabilityConfig) -> Self {
        Self {
            webhook,
            secret: secret.filter(|s| !s.is_empty()),
            attempts: reliability.notify_attempts.max(1),
            retry_delay: Duration::from_millis(reliability.notify_retry_delay_ms),
            client: reqwest::Client::new(),
        }
    }

    /// Webhook URL for one delivery attempt. Signatures are single-use: a
    /// fresh timestamp is signed on every call, so retries never reuse one.
    fn delivery_url(&self) -> String {
        match &self.secret {
            Some(secret) => {
                let timestamp = chrono::Utc::now().timestamp_millis();
                let signature = sign(secret, timestamp);
                let sep = if self.webhook.contains('?') { '&' } else { '?' };
                format!("{}{sep}timestamp={timestamp}&sign={signature}", self.webhook)
            }
            None => self.webhook.clone(),
        }
    }

    /// Deliver a notification. Retries transport and application failures
    /// alike with a fixed delay; a "content too long" response shrinks the
    /// payload in place before the next attempt. Returns after the attempt
    /// budget is exhausted without surfacing an error.
    pub async fn send(&self, mut payload: Payload) {
        for attempt in 1..=self.attempts {
            match self.post_once(&payload).await {
                Ok(()) => {
                    tracing::info!("DingTalk notification delivered");
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        "DingTalk delivery attempt {attempt}/{} failed: {e}",
                        self.attempts
                    );
                    if attempt == self.attempts {
                        break;
                    }
                    time::sleep(self.retry_delay).await;
                    if let DeliveryError::Envelope { errcode, .. } = e {
                        if let Some(transform) = transform_for(errcode) {
                            transform(&mut payload);
                            tracing::warn!("notification content shrunk before retry");
                        }
                    }
                }
            }
        }
        tracing::error!(
            "giving up on DingTalk notification after {} attempts",
            self.attempts
        );
    }

    async fn post_once(&self, payload: &Payload) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(self.delivery_url())
            .json(&payload.to_json())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status));
        }

        let body: WebhookResponse = resp.json().await?;
        if body.errmsg == "ok" {
            Ok(())
        } else {
            Err(DeliveryError::Envelope {
                errcode: body.errcode,
                errmsg: body.errmsg,
            })
        }
    }
}

/// HMAC-SHA256 over `"{timestamp}\n{secret}"` keyed with the secret itself,
/// base64- then percent-encoded for use as a query parameter.
pub fn sign(secret: &str, timestamp_ms: i64) -> String {
    let input = format!("{timestamp_ms}\n{secret}");
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(input.as_bytes());
    let digest = mac.finalize().into_bytes();
    urlencoding::encode(&BASE64.encode(digest)).into_owned()
}
