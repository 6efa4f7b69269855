//! Task Commands - 任务提交命令

use crate::domain::generation::GenerationRequest;
use crate::domain::task::RewardSpec;

/// 提交生成任务命令
#[derive(Debug, Clone)]
pub struct SubmitTask {
    /// 请求者标识（签名已在外部校验）
    pub requester: String,
    pub request: GenerationRequest,
    pub reward: Option<RewardSpec>,
}
