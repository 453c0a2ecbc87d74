use crate::config::Config;
use crate::cron::TriggerSpec;
use crate::job;
use anyhow::Result;
use chrono::Local;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::{self, Duration};

/// Shared trigger state for the single recurring check.
///
/// Exactly one writer (the job, at the end of a cycle) and one reader (the
/// scheduler computing the next fire time); the mutex guarantees neither
/// ever observes a half-written trigger.
#[derive(Clone)]
pub struct SchedulerHandle {
    trigger: Arc<Mutex<TriggerSpec>>,
}

impl SchedulerHandle {
    pub fn new(initial: TriggerSpec) -> Self {
        Self {
            trigger: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn trigger(&self) -> TriggerSpec {
        self.trigger.lock().clone()
    }

    pub fn set_trigger(&self, spec: TriggerSpec) {
        *self.trigger.lock() = spec;
    }
}

/// Run the recurring balance check until the process stops.
///
/// The next fire time is recomputed from the shared trigger after every run,
/// so a reschedule done inside the job takes effect immediately. The job is
/// awaited inline: a fire that comes due while a run is still in progress is
/// coalesced into the next computation instead of overlapping it.
pub async fn run(config: Config) -> Result<()> {
    let handle = SchedulerHandle::new(config.schedule.initial_trigger());

    loop {
        let trigger = handle.trigger();
        let next = trigger.next_fire(Local::now())?;
        tracing::info!(
            "next balance check at {} ({trigger})",
            next.format("%Y-%m-%d %H:%M:%S")
        );

        let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
        time::sleep(wait).await;

        job::run_cycle(&config, Some(&handle)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trips_trigger() {
        let handle = SchedulerHandle::new(TriggerSpec::new("Mon-Fri", "9,17", "0"));
        assert_eq!(handle.trigger(), TriggerSpec::new("Mon-Fri", "9,17", "0"));

        handle.set_trigger(TriggerSpec::new("Mon-Fri", "9-18", "0"));
        assert_eq!(handle.trigger(), TriggerSpec::new("Mon-Fri", "9-18", "0"));
    }

    #[test]
    fn clones_share_state() {
        let handle = SchedulerHandle::new(TriggerSpec::new("Mon-Fri", "9,17", "0"));
        let writer = handle.clone();
        writer.set_trigger(TriggerSpec::new("Mon-Fri", "9-18", "0"));
        assert_eq!(handle.trigger().hours, "9-18");
    }
}
