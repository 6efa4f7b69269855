//! Reward Issuer Port - 任务完成后的奖励发放
//!
//! 链上铸造等具体发放方式不在本服务内实现

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::task::{RequesterId, RewardSpec};

#[derive(Debug, Error)]
pub enum RewardError {
    #[error("Reward rejected: {0}")]
    Rejected(String),

    #[error("Reward service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RewardIssuerPort: Send + Sync {
    /// 发放奖励，返回发放凭据
    async fn issue(
        &self,
        requester: &RequesterId,
        reward: &RewardSpec,
        result_ref: &str,
    ) -> Result<String, RewardError>;
}
