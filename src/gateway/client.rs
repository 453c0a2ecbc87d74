use super::types::{
    BalanceSnapshot, DashboardDay, Envelope, LogPage, TokenData, UsageWindowSummary, round3,
};
use crate::config::{GatewayConfig, ReliabilityConfig};
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{self, Duration};

/// Entries requested per page of the usage log.
const LOG_PAGE_SIZE: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Credentials rejected, or login retries exhausted during lazy re-auth.
    #[error("gateway login failed")]
    Auth,
    /// HTTP round-trip succeeded but the envelope reported failure. Carries
    /// the response body for diagnostics.
    #[error("gateway reported failure: {body}")]
    Provider { body: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Authenticated client for the AI gateway's user API. The session lives in
/// the cookie store for the life of the process; there is no expiry tracking,
/// so callers re-login on auth failure rather than retrying blindly.
pub struct GatewayClient {
    http: reqwest::Client,
    host: String,
    username: String,
    password: String,
    key_id: i64,
    quota_per_unit: u64,
    login_attempts: u32,
    login_retry_delay: Duration,
    logged_in: AtomicBool,
}

impl GatewayClient {
    pub fn new(
        gateway: &GatewayConfig,
        reliability: &ReliabilityConfig,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(reliability.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            host: gateway.host.trim_end_matches('/').to_string(),
            username: gateway.username.clone(),
            password: gateway.password.clone(),
            key_id: gateway.key_id,
            quota_per_unit: gateway.quota_per_unit.max(1),
            login_attempts: reliability.login_attempts.max(1),
            login_retry_delay: Duration::from_millis(reliability.login_retry_delay_ms),
            logged_in: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.host)
    }

    /// Exchange credentials for a session. Idempotent: calling while already
    /// logged in simply refreshes the session cookie. Returns false after the
    /// attempt budget is exhausted so callers can degrade instead of crash.
    pub async fn login(&self) -> bool {
        for attempt in 1..=self.login_attempts {
            match self.try_login().await {
                Ok(true) => {
                    self.logged_in.store(true, Ordering::SeqCst);
                    tracing::info!("gateway login successful");
                    return true;
                }
                Ok(false) => {
                    tracing::warn!(
                        "gateway rejected login (attempt {attempt}/{})",
                        self.login_attempts
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "gateway login attempt {attempt}/{} failed: {e}",
                        self.login_attempts
                    );
                }
            }
            if attempt < self.login_attempts {
                time::sleep(self.login_retry_delay).await;
            }
        }
        tracing::error!("gateway login failed after {} attempts", self.login_attempts);
        false
    }

    async fn try_login(&self) -> Result<bool, GatewayError> {
        let body = serde_json::json!({
            "username": self.username,
            "password": self.password,
        });
        let resp = self
            .http
            .post(self.url("/api/user/login"))
            .json(&body)
            .send()
            .await?;
        let envelope: Envelope<serde_json::Value> = resp.json().await?;
        Ok(envelope.success)
    }

    /// Every authenticated call starts here instead of assuming a session
    /// exists: log in lazily, fail loudly if that still does not work.
    async fn ensure_session(&self) -> Result<(), GatewayError> {
        if self.logged_in.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.login().await {
            Ok(())
        } else {
            Err(GatewayError::Auth)
        }
    }

    /// Raw account profile from `GET /api/user/self`.
    pub async fn get_self(&self) -> Result<serde_json::Value, GatewayError> {
        self.ensure_session().await?;
        let resp = self.http.get(self.url("/api/user/self")).send().await?;
        let text = resp.text().await?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|_| GatewayError::Provider { body: text.clone() })?;
        if value.get("success").and_then(serde_json::Value::as_bool) == Some(true) {
            Ok(value)
        } else {
            Err(GatewayError::Provider { body: text })
        }
    }

    /// Raw token record envelope. The caller interprets the `success` flag;
    /// a provider-reported failure here is data, not an error.
    pub async fn get_token(&self, key_id: Option<i64>) -> Result<Envelope<TokenData>, GatewayError> {
        self.ensure_session().await?;
        let key_id = key_id.unwrap_or(self.key_id);
        let resp = self
            .http
            .get(self.url(&format!("/api/token/{key_id}")))
            .send()
            .await?;
        Ok(resp.json().await?)
    }

    /// Thin projection over [`Self::get_token`] that surfaces provider
    /// failures as errors.
    pub async fn get_balance_snapshot(&self) -> Result<BalanceSnapshot, GatewayError> {
        let envelope = self.get_token(None).await?;
        match envelope.data {
            Some(ref data) if envelope.success => {
                Ok(BalanceSnapshot::from_token(data, self.quota_per_unit))
            }
            _ => Err(GatewayError::Provider {
                body: envelope
                    .message
                    .unwrap_or_else(|| "token lookup failed".to_string()),
            }),
        }
    }

    /// Per-day request statistics from `GET /api/user/dashboard`.
    pub async fn get_dashboard(&self) -> Result<Vec<DashboardDay>, GatewayError> {
        self.ensure_session().await?;
        let resp = self.http.get(self.url("/api/user/dashboard")).send().await?;
        let text = resp.text().await?;
        let envelope: Envelope<Vec<DashboardDay>> =
            serde_json::from_str(&text).map_err(|_| GatewayError::Provider { body: text.clone() })?;
        if !envelope.success {
            return Err(GatewayError::Provider { body: text });
        }
        Ok(envelope.data.unwrap_or_default())
    }

    /// Aggregate the request log over `[start, end)`, defaulting to local
    /// start-of-day through now. Pages until the cumulative entry count
    /// reaches the server-reported total; an empty page also stops the walk
    /// so a wrong total can never loop forever.
    pub async fn get_usage_window_summary(
        &self,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<UsageWindowSummary, GatewayError> {
        self.ensure_session().await?;

        let token = self.get_token(None).await?;
        let token_name = match token.data {
            Some(ref data) if token.success => data.name.clone(),
            _ => {
                return Err(GatewayError::Provider {
                    body: token
                        .message
                        .unwrap_or_else(|| "token lookup failed".to_string()),
                });
            }
        };

        let now = Local::now();
        let window_start = start.unwrap_or_else(|| start_of_day_timestamp(now));
        let window_end = end.unwrap_or_else(|| now.timestamp());

        let mut request_count: u64 = 0;
        let mut prompt_tokens: u64 = 0;
        let mut completion_tokens: u64 = 0;
        let mut quota_spent: i64 = 0;
        let mut fetched: u64 = 0;
        let mut total_count: u64 = 0;
        let mut page: u64 = 1;

        loop {
            let params = [
                ("page", page.to_string()),
                ("size", LOG_PAGE_SIZE.to_string()),
                ("order", "-created_at".to_string()),
                ("p", "0".to_string()),
                ("token_name", token_name.clone()),
                ("model_name", String::new()),
                ("start_timestamp", window_start.to_string()),
                ("end_timestamp", window_end.to_string()),
                ("log_type", "0".to_string()),
            ];
            let resp = self
                .http
                .get(self.url("/api/log/self"))
                .query(&params)
                .send()
                .await?;
            let text = resp.text().await?;
            let envelope: Envelope<LogPage> = serde_json::from_str(&text)
                .map_err(|_| GatewayError::Provider { body: text.clone() })?;
            if !envelope.success {
                return Err(GatewayError::Provider { body: text });
            }

            let page_data = envelope.data.unwrap_or_default();
            if page_data.data.is_empty() {
                break;
            }
            for entry in &page_data.data {
                request_count += 1;
                prompt_tokens += entry.prompt_tokens;
                completion_tokens += entry.completion_tokens;
                quota_spent += entry.quota;
            }
            fetched += page_data.data.len() as u64;
            if total_count == 0 {
                total_count = page_data.total_count;
            }
            if fetched >= total_count {
                break;
            }
            page += 1;
        }

        Ok(UsageWindowSummary {
            request_count,
            total_cost: round3(quota_spent as f64 / self.quota_per_unit as f64),
            total_tokens: prompt_tokens + completion_tokens,
            window_start,
            window_end,
        })
    }
}

fn start_of_day_timestamp(now: DateTime<Local>) -> i64 {
    let midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| now.naive_local());
    match midnight.and_local_timezone(Local) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt.timestamp(),
        chrono::LocalResult::None => now.timestamp(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn start_of_day_is_midnight_local() {
        let now = Local::now();
        let start = start_of_day_timestamp(now);
        assert!(start <= now.timestamp());
        let restored = DateTime::from_timestamp(start, 0)
            .unwrap()
            .with_timezone(&Local);
        assert_eq!(restored.hour(), 0);
        assert_eq!(restored.minute(), 0);
        assert_eq!(restored.date_naive(), now.date_naive());
    }
}
