use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use cron::Schedule as CronExprSchedule;
use std::fmt;
use std::str::FromStr;

/// Trigger parameters of the recurring balance check: cron day-of-week,
/// hour, and minute fields. This is the one piece of state whose lifecycle
/// spans job invocations - the job rewrites it, the scheduler reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerSpec {
    pub days_of_week: String,
    pub hours: String,
    pub minute: String,
}

impl TriggerSpec {
    pub fn new(days_of_week: &str, hours: &str, minute: &str) -> Self {
        Self {
            days_of_week: days_of_week.to_string(),
            hours: hours.to_string(),
            minute: minute.to_string(),
        }
    }

    /// Six-field expression for the `cron` crate (seconds first).
    pub fn cron_expression(&self) -> String {
        format!("0 {} {} * * {}", self.minute, self.hours, self.days_of_week)
    }

    /// First fire time strictly after `from`, in `from`'s own timezone.
    pub fn next_fire<Tz: TimeZone>(&self, from: DateTime<Tz>) -> Result<DateTime<Tz>> {
        let expr = self.cron_expression();
        let schedule = CronExprSchedule::from_str(&expr)
            .with_context(|| format!("invalid trigger expression: {expr}"))?;
        schedule
            .after(&from)
            .next()
            .ok_or_else(|| anyhow::anyhow!("no future occurrence for expression: {expr}"))
    }
}

impl fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "days={} hours={} minute={}",
            self.days_of_week, self.hours, self.minute
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};

    #[test]
    fn sparse_trigger_fires_at_listed_hours_only() {
        let spec = TriggerSpec::new("Mon-Fri", "9,17", "0");
        // Wednesday 2026-02-18 10:00 UTC -> same day 17:00.
        let from = Utc.with_ymd_and_hms(2026, 2, 18, 10, 0, 0).unwrap();
        let next = spec.next_fire(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 18, 17, 0, 0).unwrap());

        // After the 17:00 slot the next fire is 9:00 the following day.
        let next = spec.next_fire(next).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 19, 9, 0, 0).unwrap());
    }

    #[test]
    fn hourly_trigger_fires_every_hour_in_band() {
        let spec = TriggerSpec::new("Mon-Fri", "9-18", "0");
        let from = Utc.with_ymd_and_hms(2026, 2, 18, 12, 30, 0).unwrap();
        let next = spec.next_fire(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 18, 13, 0, 0).unwrap());
    }

    #[test]
    fn minute_step_is_honored() {
        let spec = TriggerSpec::new("Mon-Fri", "9-17", "*/30");
        let from = Utc.with_ymd_and_hms(2026, 2, 18, 9, 5, 0).unwrap();
        let next = spec.next_fire(from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 2, 18, 9, 30, 0).unwrap());
    }

    #[test]
    fn weekend_is_skipped() {
        let spec = TriggerSpec::new("Mon-Fri", "9,17", "0");
        // Friday 2026-02-20 18:00 -> Monday 09:00.
        let from = Utc.with_ymd_and_hms(2026, 2, 20, 18, 0, 0).unwrap();
        let next = spec.next_fire(from).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.hour(), 9);
        assert_eq!(next.day(), 23);
    }

    #[test]
    fn malformed_fields_are_an_error() {
        let spec = TriggerSpec::new("Mon-Fri", "not-an-hour", "0");
        assert!(spec.next_fire(Utc::now()).is_err());
    }

    #[test]
    fn display_is_loggable() {
        let spec = TriggerSpec::new("Mon-Fri", "9,17", "0");
        assert_eq!(spec.to_string(), "days=Mon-Fri hours=9,17 minute=0");
    }
}
