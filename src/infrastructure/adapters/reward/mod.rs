//! Reward Adapter - 奖励发放实现

mod logging_reward_issuer;

pub use logging_reward_issuer::LoggingRewardIssuer;
