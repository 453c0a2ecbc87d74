use crate::cron::TriggerSpec;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// State directory (holiday cache etc.) - computed from home, not serialized
    #[serde(skip)]
    pub state_dir: PathBuf,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub holiday: HolidayConfig,
}

// ── Gateway account ──────────────────────────────────────────────

/// Account on the AI gateway whose balance is being watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Display name used in notification titles
    #[serde(default = "default_gateway_name")]
    pub name: String,
    /// Base URL of the gateway, e.g. "https://api.example.com"
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Numeric id of the API token to watch
    #[serde(default = "default_key_id")]
    pub key_id: i64,
    /// Currency symbol shown in notifications
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Provider quota units per currency unit
    #[serde(default = "default_quota_per_unit")]
    pub quota_per_unit: u64,
}

fn default_gateway_name() -> String {
    "gateway".to_string()
}

fn default_key_id() -> i64 {
    1
}

fn default_currency() -> String {
    "¥".to_string()
}

fn default_quota_per_unit() -> u64 {
    500_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_gateway_name(),
            host: String::new(),
            username: String::new(),
            password: String::new(),
            key_id: default_key_id(),
            currency: default_currency(),
            quota_per_unit: default_quota_per_unit(),
        }
    }
}

// ── Notification webhooks ────────────────────────────────────────

/// Named webhook profiles plus the profile selected for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Which entry of `webhooks` to deliver to
    #[serde(default = "default_active_webhook")]
    pub active: String,
    #[serde(default)]
    pub webhooks: HashMap<String, WebhookProfile>,
}

fn default_active_webhook() -> String {
    "test".to_string()
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            active: default_active_webhook(),
            webhooks: HashMap::new(),
        }
    }
}

impl NotifyConfig {
    pub fn active_webhook(&self) -> Result<&WebhookProfile> {
        self.webhooks
            .get(&self.active)
            .with_context(|| format!("no webhook profile named '{}'", self.active))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookProfile {
    /// Full robot webhook URL including the access token
    #[serde(default)]
    pub webhook: String,
    /// Optional signing secret; empty disables signing
    #[serde(default)]
    pub secret: Option<String>,
}

// ── Check schedule ───────────────────────────────────────────────

/// Cadence bands for the recurring balance check.
///
/// The threshold and hour-band values mirror the observed deployment; they
/// are configuration, not semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Cron day-of-week field for every cadence, e.g. "Mon-Fri"
    #[serde(default = "default_days_of_week")]
    pub days_of_week: String,
    /// Hours checked when the balance is healthy
    #[serde(default = "default_sparse_hours")]
    pub sparse_hours: String,
    /// Hours checked when the balance is running low
    #[serde(default = "default_hourly_hours")]
    pub hourly_hours: String,
    /// Hours used before the first check has observed a balance
    #[serde(default = "default_initial_hours")]
    pub initial_hours: String,
    /// Minute field used before the first check has observed a balance
    #[serde(default = "default_initial_minute")]
    pub initial_minute: String,
    /// First local hour (inclusive) in which the daily usage summary is added
    #[serde(default = "default_usage_hours_start")]
    pub usage_hours_start: u32,
    /// Last local hour (inclusive) in which the daily usage summary is added
    #[serde(default = "default_usage_hours_end")]
    pub usage_hours_end: u32,
    /// Credit below which the notification carries a top-up warning
    #[serde(default = "default_low_balance_warning")]
    pub low_balance_warning: f64,
    /// Credit below which the check switches to the hourly cadence
    #[serde(default = "default_hourly_threshold")]
    pub hourly_threshold: f64,
}

fn default_days_of_week() -> String {
    "Mon-Fri".to_string()
}

fn default_sparse_hours() -> String {
    "9,17".to_string()
}

fn default_hourly_hours() -> String {
    "9-18".to_string()
}

fn default_initial_hours() -> String {
    "9-17".to_string()
}

fn default_initial_minute() -> String {
    "*/30".to_string()
}

fn default_usage_hours_start() -> u32 {
    16
}

fn default_usage_hours_end() -> u32 {
    19
}

fn default_low_balance_warning() -> f64 {
    1.0
}

fn default_hourly_threshold() -> f64 {
    0.5
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            days_of_week: default_days_of_week(),
            sparse_hours: default_sparse_hours(),
            hourly_hours: default_hourly_hours(),
            initial_hours: default_initial_hours(),
            initial_minute: default_initial_minute(),
            usage_hours_start: default_usage_hours_start(),
            usage_hours_end: default_usage_hours_end(),
            low_balance_warning: default_low_balance_warning(),
            hourly_threshold: default_hourly_threshold(),
        }
    }
}

impl ScheduleConfig {
    pub fn initial_trigger(&self) -> TriggerSpec {
        TriggerSpec::new(&self.days_of_week, &self.initial_hours, &self.initial_minute)
    }

    pub fn sparse_trigger(&self) -> TriggerSpec {
        TriggerSpec::new(&self.days_of_week, &self.sparse_hours, "0")
    }

    pub fn hourly_trigger(&self) -> TriggerSpec {
        TriggerSpec::new(&self.days_of_week, &self.hourly_hours, "0")
    }

    /// Cadence for the next recurrence given the credit a check just
    /// observed. Strictly below the threshold switches to hourly; the
    /// threshold itself stays sparse.
    pub fn trigger_for_credit(&self, credit: f64) -> TriggerSpec {
        if credit < self.hourly_threshold {
            self.hourly_trigger()
        } else {
            self.sparse_trigger()
        }
    }

    pub fn in_usage_window(&self, hour: u32) -> bool {
        hour >= self.usage_hours_start && hour <= self.usage_hours_end
    }
}

// ── Reliability ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Login attempts before the check degrades to a failure notification
    #[serde(default = "default_login_attempts")]
    pub login_attempts: u32,
    /// Fixed delay between login attempts (ms)
    #[serde(default = "default_retry_delay_ms")]
    pub login_retry_delay_ms: u64,
    /// Webhook delivery attempts before giving up silently
    #[serde(default = "default_notify_attempts")]
    pub notify_attempts: u32,
    /// Fixed delay between webhook delivery attempts (ms)
    #[serde(default = "default_retry_delay_ms")]
    pub notify_retry_delay_ms: u64,
    /// Timeout for every outbound HTTP request (s)
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_login_attempts() -> u32 {
    5
}

fn default_notify_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            login_attempts: default_login_attempts(),
            login_retry_delay_ms: default_retry_delay_ms(),
            notify_attempts: default_notify_attempts(),
            notify_retry_delay_ms: default_retry_delay_ms(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

// ── Observability ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Default log level; RUST_LOG overrides when set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Append logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

// ── Holiday calendar ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayConfig {
    /// Base URL of the holiday calendar API
    #[serde(default = "default_holiday_host")]
    pub host: String,
}

fn default_holiday_host() -> String {
    "https://date.appworlds.cn".to_string()
}

impl Default for HolidayConfig {
    fn default() -> Self {
        Self {
            host: default_holiday_host(),
        }
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let state_dir = home.join(".quotawatch");
        let config_path = state_dir.join("config.toml");

        if !state_dir.exists() {
            fs::create_dir_all(&state_dir).context("Failed to create .quotawatch directory")?;
        }

        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path;
            config.state_dir = state_dir;
            config.apply_env_overrides();
            Ok(config)
        } else {
            let mut config = Config::default();
            config.config_path = config_path;
            config.state_dir = state_dir;
            config.save()?;
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("QUOTAWATCH_GATEWAY_HOST") {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }
        if let Ok(username) = std::env::var("QUOTAWATCH_USERNAME") {
            if !username.is_empty() {
                self.gateway.username = username;
            }
        }
        if let Ok(password) = std::env::var("QUOTAWATCH_PASSWORD") {
            if !password.is_empty() {
                self.gateway.password = password;
            }
        }
        // Points the active profile at a different robot without editing
        // config.toml, creating the profile when absent.
        if let Ok(webhook) = std::env::var("QUOTAWATCH_WEBHOOK") {
            if !webhook.is_empty() {
                let active = self.notify.active.clone();
                self.notify.webhooks.entry(active).or_default().webhook = webhook;
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, contents).context("Failed to write config file")?;
        Ok(())
    }
}
