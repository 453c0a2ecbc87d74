//! Workday lookup backed by a public holiday calendar.
//!
//! Fetched calendars are cached as one JSON file per year. When the calendar
//! cannot be fetched the lookup degrades to plain Monday-Friday judgment.
//! Not consulted by the balance check job; exposed through the `workday`
//! CLI subcommand.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// One calendar row: either a holiday or a compensating workday that falls
/// on a weekend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolidayDay {
    pub date: String,
    #[serde(default)]
    pub holiday: bool,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub days: u32,
}

#[derive(Debug, Deserialize)]
struct CalendarResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<HolidayDay>,
}

pub struct WorkdayLookup {
    host: String,
    cache_dir: PathBuf,
    client: reqwest::Client,
}

impl WorkdayLookup {
    pub fn new(host: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        let host: String = host.into();
        Self {
            host: host.trim_end_matches('/').to_string(),
            cache_dir: cache_dir.into(),
            client: reqwest::Client::new(),
        }
    }

    fn cache_path(&self, year: i32) -> PathBuf {
        self.cache_dir.join(format!("{year}.json"))
    }

    async fn fetch_year(&self, year: i32) -> Result<Vec<HolidayDay>> {
        let url = format!("{}/year/{year}", self.host);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("holiday calendar request failed: {url}"))?;
        let body: CalendarResponse = resp
            .json()
            .await
            .context("holiday calendar returned invalid JSON")?;
        if body.code != 200 {
            anyhow::bail!(
                "holiday calendar error {}: {}",
                body.code,
                body.msg.unwrap_or_default()
            );
        }
        Ok(body.data)
    }

    fn load_cached(&self, year: i32) -> Option<Vec<HolidayDay>> {
        let contents = fs::read_to_string(self.cache_path(year)).ok()?;
        let days: Vec<HolidayDay> = serde_json::from_str(&contents).ok()?;
        if days.is_empty() { None } else { Some(days) }
    }

    fn store_cache(&self, year: i32, days: &[HolidayDay]) {
        if let Err(e) = self.try_store_cache(year, days) {
            tracing::warn!("failed to cache holiday calendar for {year}: {e}");
        }
    }

    fn try_store_cache(&self, year: i32, days: &[HolidayDay]) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        let json = serde_json::to_string_pretty(days)?;
        fs::write(self.cache_path(year), json)?;
        Ok(())
    }

    /// Calendar for a year: cache hit, or fetch-and-cache. Returns an empty
    /// table when the calendar is unavailable so callers fall back to the
    /// weekday rule.
    pub async fn load_or_fetch(&self, year: i32) -> Vec<HolidayDay> {
        if let Some(days) = self.load_cached(year) {
            return days;
        }
        match self.fetch_year(year).await {
            Ok(days) if !days.is_empty() => {
                self.store_cache(year, &days);
                days
            }
            Ok(_) => {
                tracing::warn!("holiday calendar for {year} is empty, using weekday rule");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!("could not fetch holiday calendar for {year}: {e}, using weekday rule");
                Vec::new()
            }
        }
    }

    /// Whether a date is a workday. An explicit calendar row wins; any other
    /// date is a workday exactly when it is Monday through Friday.
    pub async fn is_workday(&self, date: NaiveDate) -> bool {
        let table = self.load_or_fetch(date.year()).await;
        let key = date.format("%Y-%m-%d").to_string();
        if let Some(day) = table.iter().find(|d| d.date == key) {
            return !day.holiday;
        }
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }
}
