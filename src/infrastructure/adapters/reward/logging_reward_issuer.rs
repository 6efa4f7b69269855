//! Logging Reward Issuer - 只记录日志的奖励发放
//!
//! 链上发放由外部服务完成，这里生成凭据并输出结构化日志供其消费

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::ports::{RewardError, RewardIssuerPort};
use crate::domain::task::{RequesterId, RewardSpec};

#[derive(Debug, Default)]
pub struct LoggingRewardIssuer;

impl LoggingRewardIssuer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RewardIssuerPort for LoggingRewardIssuer {
    async fn issue(
        &self,
        requester: &RequesterId,
        reward: &RewardSpec,
        result_ref: &str,
    ) -> Result<String, RewardError> {
        if reward.amount == 0 {
            return Err(RewardError::Rejected("reward amount must be positive".to_string()));
        }

        let receipt = format!("reward-{}", Uuid::new_v4());
        tracing::info!(
            requester = %requester,
            kind = %reward.kind,
            amount = reward.amount,
            memo = ?reward.memo,
            result_ref,
            receipt = %receipt,
            "Reward issued"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_amount_rejected() {
        let issuer = LoggingRewardIssuer::new();
        let requester = RequesterId::new("0xabc").unwrap();
        let reward = RewardSpec {
            kind: "token".to_string(),
            amount: 0,
            memo: None,
        };
        assert!(issuer.issue(&requester, &reward, "a.png").await.is_err());

        let reward = RewardSpec { amount: 5, ..reward };
        let receipt = issuer.issue(&requester, &reward, "a.png").await.unwrap();
        assert!(receipt.starts_with("reward-"));
    }
}
