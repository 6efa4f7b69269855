//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 1. 环境变量（前缀 `SDRELAY_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `SDRELAY_BACKEND__URL=http://gpu-box:7860`
/// - `SDRELAY_BACKEND__MODEL=anything-v3`
/// - `SDRELAY_RELAY__WORKER_URL=http://worker:5070`
/// - `SDRELAY_DATABASE__PATH=/data/sdrelay.db`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.worker_port", 5070)?
        .set_default("server.origin_port", 5060)?
        .set_default("backend.url", "http://127.0.0.1:7860")?
        .set_default("backend.timeout_secs", 30)?
        .set_default("backend.default_sampler", "Euler a")?
        .set_default("backend.default_steps", 20)?
        .set_default("backend.find_closest", true)?
        .set_default("relay.worker_url", "http://127.0.0.1:5070")?
        .set_default("relay.dispatch_timeout_secs", 600)?
        .set_default("relay.wait_for_ready", true)?
        .set_default("relay.ready_check_interval_secs", 5)?
        .set_default("relay.ready_max_poll_failures", 3)?
        .set_default("relay.pull_interval_secs", 2)?
        .set_default("relay.lease_secs", 900)?
        .set_default("database.path", "data/sdrelay.db")?
        .set_default("database.max_connections", 5)?
        .set_default("storage.image_dir", "data/images")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级）
    // 例如: SDRELAY_BACKEND__URL=http://gpu-box:7860
    builder = builder.add_source(
        Environment::with_prefix("SDRELAY")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.worker_port == 0 || config.server.origin_port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }

    if config.backend.url.trim().is_empty() {
        return Err(invalid("Backend URL cannot be empty"));
    }

    if config.backend.timeout_secs == 0 {
        return Err(invalid("Backend timeout cannot be 0"));
    }

    if config.backend.username.is_some() != config.backend.password.is_some() {
        return Err(invalid(
            "Backend username and password must be set together",
        ));
    }

    if config.relay.worker_url.trim().is_empty() {
        return Err(invalid("Worker URL cannot be empty"));
    }

    if config.relay.ready_check_interval_secs == 0 || config.relay.pull_interval_secs == 0 {
        return Err(invalid("Relay intervals cannot be 0"));
    }

    if config.relay.ready_max_poll_failures == 0 {
        return Err(invalid("Ready poll failure limit cannot be 0"));
    }

    if config.relay.lease_secs == 0 {
        return Err(invalid("Task lease cannot be 0"));
    }

    if config.database.path.is_empty() {
        return Err(invalid("Database path cannot be empty"));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Listen Host: {}", config.server.host);
    tracing::info!(
        "Ports: worker={} origin={}",
        config.server.worker_port,
        config.server.origin_port
    );
    tracing::info!("Backend URL: {}", config.backend.url);
    tracing::info!("Backend Timeout: {}s", config.backend.timeout_secs);
    tracing::info!("Backend Auth: {}", config.backend.username.is_some());
    tracing::info!(
        "Defaults: sampler={} steps={}",
        config.backend.default_sampler,
        config.backend.default_steps
    );
    if let Some(model) = &config.backend.model {
        tracing::info!("Model: {} (find_closest={})", model, config.backend.find_closest);
    }
    tracing::info!("Worker URL: {}", config.relay.worker_url);
    tracing::info!(
        "Wait For Ready: {} (every {}s, max {} failures)",
        config.relay.wait_for_ready,
        config.relay.ready_check_interval_secs,
        config.relay.ready_max_poll_failures
    );
    tracing::info!("Lease: {}s", config.relay.lease_secs);
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Image Directory: {:?}", config.storage.image_dir);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
