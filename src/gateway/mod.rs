pub mod client;
pub mod types;

pub use client::{GatewayClient, GatewayError};
pub use types::{
    BalanceSnapshot, DashboardDay, Envelope, LogEntry, LogPage, TokenData, UsageWindowSummary,
    compact_token_count, mask_key,
};
