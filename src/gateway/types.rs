use serde::Deserialize;

/// JSON envelope every gateway endpoint wraps its response in.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

/// Raw token record from `GET /api/token/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenData {
    pub name: String,
    pub key: String,
    #[serde(default)]
    pub used_quota: i64,
    #[serde(default)]
    pub unlimited_quota: bool,
    #[serde(default)]
    pub remain_quota: i64,
}

/// One page of `GET /api/log/self`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogPage {
    #[serde(default)]
    pub data: Vec<LogEntry>,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub quota: i64,
}

/// One row of `GET /api/user/dashboard` per-day statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardDay {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "RequestCount", default)]
    pub request_count: u64,
    #[serde(rename = "PromptTokens", default)]
    pub prompt_tokens: u64,
    #[serde(rename = "CompletionTokens", default)]
    pub completion_tokens: u64,
}

/// Point-in-time view of the watched token's balance. Derived from a single
/// token response and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSnapshot {
    pub token_name: String,
    pub masked_key: String,
    pub remaining_quota: i64,
    pub used_quota: i64,
    pub unlimited: bool,
    pub quota_per_unit: u64,
}

impl BalanceSnapshot {
    pub fn from_token(data: &TokenData, quota_per_unit: u64) -> Self {
        Self {
            token_name: data.name.clone(),
            masked_key: mask_key(&data.key),
            remaining_quota: data.remain_quota,
            used_quota: data.used_quota,
            unlimited: data.unlimited_quota,
            quota_per_unit,
        }
    }

    /// Remaining balance in currency units, rounded to 2 decimals.
    pub fn remaining_credit(&self) -> f64 {
        round2(self.remaining_quota as f64 / self.quota_per_unit as f64)
    }

    /// Spent balance in currency units, rounded to 2 decimals.
    pub fn used_credit(&self) -> f64 {
        round2(self.used_quota as f64 / self.quota_per_unit as f64)
    }
}

/// Usage aggregated over `[window_start, window_end)` of the request log.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageWindowSummary {
    pub request_count: u64,
    /// Currency units, rounded to 3 decimals
    pub total_cost: f64,
    pub total_tokens: u64,
    pub window_start: i64,
    pub window_end: i64,
}

impl UsageWindowSummary {
    pub fn tokens_display(&self) -> String {
        compact_token_count(self.total_tokens)
    }
}

/// First 3 characters, 5 asterisks, last 5 characters. The middle of the key
/// never appears anywhere user-visible.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let head: String = chars.iter().take(3).collect();
    let tail: String = chars[chars.len().saturating_sub(5)..].iter().collect();
    format!("{head}*****{tail}")
}

/// Token counts over 1000 compress to a "k" suffix with two decimals;
/// exactly 1000 and below print verbatim.
pub fn compact_token_count(total: u64) -> String {
    if total > 1000 {
        format!("{:.2}k", total as f64 / 1000.0)
    } else {
        total.to_string()
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_key_fixed_shape() {
        let masked = mask_key("sk-ABCDEFGHIJKL");
        assert_eq!(masked, "sk-*****HIJKL");
        assert_eq!(masked.chars().count(), 13);

        let longer = mask_key("sk-0123456789abcdef0123456789abcdef");
        assert!(longer.starts_with("sk-*****"));
        assert!(longer.ends_with("bcdef"));
        assert_eq!(longer.chars().count(), 13);
    }

    #[test]
    fn compact_token_count_boundaries() {
        assert_eq!(compact_token_count(500), "500");
        assert_eq!(compact_token_count(1000), "1000");
        assert_eq!(compact_token_count(1001), "1.00k");
        assert_eq!(compact_token_count(2500), "2.50k");
        assert_eq!(compact_token_count(1_234_567), "1234.57k");
    }

    #[test]
    fn snapshot_credit_is_rounded_to_cents() {
        let data = TokenData {
            name: "default".into(),
            key: "sk-ABCDEFGHIJKL".into(),
            used_quota: 1_234_567,
            unlimited_quota: false,
            remain_quota: 333_333,
        };
        let snapshot = BalanceSnapshot::from_token(&data, 500_000);
        assert_eq!(snapshot.masked_key, "sk-*****HIJKL");
        assert_eq!(snapshot.remaining_credit(), 0.67);
        assert_eq!(snapshot.used_credit(), 2.47);
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let envelope: Envelope<TokenData> = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(!envelope.success);
        assert!(envelope.message.is_none());
        assert!(envelope.data.is_none());
    }
}
