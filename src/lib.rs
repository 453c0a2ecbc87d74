#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::cast_precision_loss,
    clippy::float_cmp,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod config;
pub mod cron;
pub mod gateway;
pub mod job;
pub mod notify;
pub mod workday;

pub use config::Config;
