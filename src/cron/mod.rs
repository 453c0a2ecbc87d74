pub mod schedule;
pub mod scheduler;

pub use schedule::TriggerSpec;
pub use scheduler::{SchedulerHandle, run};
