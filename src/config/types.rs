//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 生成后端配置
    #[serde(default)]
    pub backend: BackendConfig,

    /// 中继配置
    #[serde(default)]
    pub relay: RelayConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// worker 侧（ai）监听端口
    #[serde(default = "default_worker_port")]
    pub worker_port: u16,

    /// origin 侧（frontend）监听端口
    #[serde(default = "default_origin_port")]
    pub origin_port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_worker_port() -> u16 {
    5070
}

fn default_origin_port() -> u16 {
    5060
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            worker_port: default_worker_port(),
            origin_port: default_origin_port(),
        }
    }
}

/// 生成后端（A1111 WebUI API）配置
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// 后端基础 URL
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,

    /// Basic Auth 用户名
    #[serde(default)]
    pub username: Option<String>,

    /// Basic Auth 密码
    #[serde(default)]
    pub password: Option<String>,

    /// 未指定时使用的采样器
    #[serde(default = "default_sampler")]
    pub default_sampler: String,

    /// 未指定时使用的步数
    #[serde(default = "default_steps")]
    pub default_steps: u32,

    /// worker 启动时切换到的模型
    #[serde(default)]
    pub model: Option<String>,

    /// 模型名称允许模糊匹配
    #[serde(default = "default_find_closest")]
    pub find_closest: bool,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:7860".to_string()
}

fn default_backend_timeout() -> u64 {
    30
}

fn default_sampler() -> String {
    "Euler a".to_string()
}

fn default_steps() -> u32 {
    20
}

fn default_find_closest() -> bool {
    true
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: default_backend_timeout(),
            username: None,
            password: None,
            default_sampler: default_sampler(),
            default_steps: default_steps(),
            model: None,
            find_closest: default_find_closest(),
        }
    }
}

/// 中继配置
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// origin 侧访问 worker 的 URL
    #[serde(default = "default_worker_url")]
    pub worker_url: String,

    /// origin 等待 worker 回复的超时（秒）
    #[serde(default = "default_dispatch_timeout")]
    pub dispatch_timeout_secs: u64,

    /// worker 提交前等待后端空闲
    #[serde(default = "default_wait_for_ready")]
    pub wait_for_ready: bool,

    /// 就绪轮询间隔（秒）
    #[serde(default = "default_ready_check_interval")]
    pub ready_check_interval_secs: u64,

    /// 允许的连续轮询失败次数
    #[serde(default = "default_ready_max_poll_failures")]
    pub ready_max_poll_failures: u32,

    /// 队列为空时的拉取间隔（秒）
    #[serde(default = "default_pull_interval")]
    pub pull_interval_secs: u64,

    /// 任务租约时长（秒）
    #[serde(default = "default_lease")]
    pub lease_secs: u64,

    /// origin 实例标识，未设置时启动时随机生成
    #[serde(default)]
    pub instance_id: Option<String>,
}

fn default_worker_url() -> String {
    "http://127.0.0.1:5070".to_string()
}

fn default_dispatch_timeout() -> u64 {
    600
}

fn default_wait_for_ready() -> bool {
    true
}

fn default_ready_check_interval() -> u64 {
    5
}

fn default_ready_max_poll_failures() -> u32 {
    3
}

fn default_pull_interval() -> u64 {
    2
}

fn default_lease() -> u64 {
    900
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            worker_url: default_worker_url(),
            dispatch_timeout_secs: default_dispatch_timeout(),
            wait_for_ready: default_wait_for_ready(),
            ready_check_interval_secs: default_ready_check_interval(),
            ready_max_poll_failures: default_ready_max_poll_failures(),
            pull_interval_secs: default_pull_interval(),
            lease_secs: default_lease(),
            instance_id: None,
        }
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/sdrelay.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 生成图像保存目录
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("data/images")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别（trace, debug, info, warn, error）
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl DatabaseConfig {
    /// sqlx 连接 URL，文件不存在时自动创建
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}
