pub mod dingtalk;
pub mod payload;

pub use dingtalk::DingTalkNotifier;
pub use payload::{ButtonOrientation, CardButton, Mentions, Payload};
