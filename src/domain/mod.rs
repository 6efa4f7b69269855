//! Domain Layer - 领域层
//!
//! 包含三个限界上下文:
//! - Image: 图像句柄与传输编码
//! - Generation: 生成请求、默认值与结果
//! - Task: 中继任务与租约
//!
//! 以及共享的模型名称匹配算法。

pub mod generation;
pub mod image;
pub mod task;

// 共享的模型匹配
pub mod model_match;
