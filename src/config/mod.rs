pub mod schema;

pub use schema::{
    Config, GatewayConfig, HolidayConfig, NotifyConfig, ObservabilityConfig, ReliabilityConfig,
    ScheduleConfig, WebhookProfile,
};
