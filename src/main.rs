//! sdrelay - Stable Diffusion 任务中继
//!
//! `--relaySide ai`       worker 侧: 直连生成后端，接收中继任务
//! `--relaySide frontend` origin 侧: 接收用户任务，派发给 worker

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use sdrelay::application::{
    BackendCatalog, GenerationClient, ModelResolver, ReadinessPoller, ReadinessPollerConfig,
};
use sdrelay::config::{load_config_from_path, print_config, AppConfig};
use sdrelay::domain::generation::GenerationDefaults;
use sdrelay::infrastructure::adapters::{
    FileImageStore, HttpBackendClient, HttpBackendClientConfig, HttpWorkerClient,
    HttpWorkerClientConfig, LoggingRewardIssuer, SystemClock,
};
use sdrelay::infrastructure::events::EventPublisher;
use sdrelay::infrastructure::http::{HttpServer, OriginState, ServerConfig, WorkerState};
use sdrelay::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};
use sdrelay::infrastructure::persistence::SqliteTaskStore;
use sdrelay::infrastructure::relay::{
    OriginRelay, OriginRelayConfig, RelayRole, WorkerService,
};

#[derive(Debug, Parser)]
#[command(name = "sdrelay", version, about = "Stable Diffusion task relay")]
struct Cli {
    /// 进程角色: ai | frontend
    #[arg(long = "relaySide", alias = "relay-side", value_name = "ROLE")]
    relay_side: Option<String>,

    /// 配置文件路径
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

const USAGE: &str = "usage: sdrelay --relaySide <ai|frontend> [--config <path>]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 角色无效时直接退出，不读取配置
    let role = match RelayRole::from_arg(cli.relay_side.as_deref()) {
        Ok(role) => role,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return Ok(());
        }
    };

    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config_from_path(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_logging(&config);

    tracing::info!(role = %role, "sdrelay starting");
    print_config(&config);

    let shutdown = CancellationToken::new();
    let events = EventPublisher::new().arc();
    let event_log = events.spawn_log_forwarder(shutdown.clone());

    match role {
        RelayRole::Worker => run_worker(config, events, shutdown).await?,
        RelayRole::Origin => run_origin(config, events, shutdown).await?,
    }

    if let Ok(forwarded) = event_log.await {
        tracing::debug!(forwarded, "Relay event log closed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_logging(config: &AppConfig) {
    let log_filter = format!(
        "{},sdrelay={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Ctrl-C 后取消 token
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
    }
    tracing::info!("Received shutdown signal");
    shutdown.cancel();
}

async fn run_worker(
    config: AppConfig,
    events: Arc<EventPublisher>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let mut backend_config = HttpBackendClientConfig::new(&config.backend.url)
        .with_timeout(config.backend.timeout_secs);
    if let (Some(username), Some(password)) = (&config.backend.username, &config.backend.password) {
        backend_config = backend_config.with_auth(username, password);
    }
    let transport = Arc::new(HttpBackendClient::new(backend_config)?);
    let catalog = Arc::new(BackendCatalog::new(transport.clone()));

    // 接收任务前切换模型，失败则不启动
    if let Some(model) = &config.backend.model {
        let resolved = ModelResolver::new(catalog.clone())
            .set_model(model, config.backend.find_closest)
            .await?;
        tracing::info!(requested = %model, model = %resolved, "Startup model applied");
    }

    let client = Arc::new(GenerationClient::new(
        transport,
        GenerationDefaults {
            sampler_name: config.backend.default_sampler.clone(),
            steps: config.backend.default_steps,
        },
    ));

    let poller = if config.relay.wait_for_ready {
        Some(Arc::new(ReadinessPoller::new(
            catalog.clone(),
            Arc::new(SystemClock),
            events,
            ReadinessPollerConfig {
                check_interval: Duration::from_secs(config.relay.ready_check_interval_secs),
                max_consecutive_failures: config.relay.ready_max_poll_failures,
                ..Default::default()
            },
        )))
    } else {
        None
    };

    let service = Arc::new(WorkerService::new(client, catalog, poller));
    let server = HttpServer::worker(
        ServerConfig::new(&config.server.host, config.server.worker_port),
        WorkerState::new(service, shutdown.clone()),
    );

    server.run_with_shutdown(shutdown_signal(shutdown)).await?;
    Ok(())
}

async fn run_origin(
    config: AppConfig,
    events: Arc<EventPublisher>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    // 确保数据目录存在
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = create_pool(&DatabaseConfig {
        database_url: config.database.database_url(),
        max_connections: config.database.max_connections,
    })
    .await?;
    run_migrations(&pool).await?;

    let store = Arc::new(SqliteTaskStore::new(pool));
    let dispatcher = Arc::new(HttpWorkerClient::new(HttpWorkerClientConfig {
        base_url: config.relay.worker_url.clone(),
        timeout_secs: config.relay.dispatch_timeout_secs,
    })?);
    let image_store = Arc::new(FileImageStore::new(&config.storage.image_dir).await?);

    let mut relay_config = OriginRelayConfig {
        lease: Duration::from_secs(config.relay.lease_secs),
        pull_interval: Duration::from_secs(config.relay.pull_interval_secs),
        ..Default::default()
    };
    if let Some(instance_id) = &config.relay.instance_id {
        relay_config.instance_id = instance_id.clone();
    }

    let relay = OriginRelay::new(
        relay_config,
        store.clone(),
        dispatcher,
        image_store,
        Arc::new(LoggingRewardIssuer::new()),
        events,
        Arc::new(SystemClock),
    );
    let relay_handle = tokio::spawn({
        let cancel = shutdown.clone();
        async move { relay.run(cancel).await }
    });

    let server = HttpServer::origin(
        ServerConfig::new(&config.server.host, config.server.origin_port),
        OriginState::new(store),
    );
    let served = server.run_with_shutdown(shutdown_signal(shutdown.clone())).await;

    // 服务器异常退出时也要停止派发循环
    shutdown.cancel();
    if let Err(e) = relay_handle.await {
        tracing::error!(error = %e, "OriginRelay task panicked");
    }

    served?;
    Ok(())
}
