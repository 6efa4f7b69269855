//! Progress - 后端进度快照

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 后端作业状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    #[serde(default)]
    pub skipped: bool,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub job: String,
    /// 作业开始时后端会短暂报告 -1
    pub job_count: i64,
    #[serde(default)]
    pub job_timestamp: String,
    #[serde(default)]
    pub job_no: u32,
    #[serde(default)]
    pub sampling_step: u32,
    #[serde(default)]
    pub sampling_steps: u32,
}

/// `/sdapi/v1/progress` 的回复
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    pub progress: f64,
    #[serde(default)]
    pub eta_relative: f64,
    pub state: JobState,
    #[serde(default)]
    pub current_image: Option<String>,
    #[serde(default)]
    pub textinfo: Option<String>,
}

impl ProgressState {
    /// 同一快照中进度为 0 且无排队作业时后端空闲
    pub fn is_idle(&self) -> bool {
        self.progress == 0.0 && self.state.job_count == 0
    }

    pub fn job_count(&self) -> i64 {
        self.state.job_count
    }
}

impl TryFrom<Value> for ProgressState {
    type Error = serde_json::Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value)
    }
}
