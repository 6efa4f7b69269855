//! sdrelay - Stable Diffusion WebUI API 客户端与任务中继
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Generation: 请求参数、默认值、规范化、结果解码、进度
//! - Image: 图像句柄与 base64 PNG 编解码
//! - Task: 中继任务聚合与租约
//! - Model Match: 模型名称模糊匹配
//!
//! 应用层 (application/):
//! - Ports: 端口定义（BackendTransport, TaskStore, WorkerDispatch, ImageStore, RewardIssuer, Clock, Events）
//! - Services: GenerationClient, BackendCatalog, ModelResolver, ReadinessPoller
//! - Commands / Queries: 任务提交与查询
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: reqwest 后端与 worker 客户端、文件图像存储、奖励、时钟
//! - Persistence: SQLite 任务存储
//! - Memory: 内存任务存储
//! - Relay: OriginRelay 派发循环, WorkerService
//! - HTTP: worker 与 origin 两套接口
//! - Events: 中继事件发布

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
