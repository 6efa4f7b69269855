//! Origin relay end to end: SQLite task store -> HTTP worker -> scripted backend

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use sdrelay::application::{
    BackendCatalog, BackendError, GenerationClient, RelayError, RelayEvent, RelayJob, TaskStorePort,
    WorkerDispatchPort,
};
use sdrelay::domain::generation::{
    GenerationDefaults, GenerationRequest, GenerationResult, Txt2ImgOptions,
};
use sdrelay::domain::image::{ImageCodec, ImageHandle};
use sdrelay::domain::task::{RequesterId, RewardSpec, Task, TaskStatus};
use sdrelay::infrastructure::adapters::{
    FakeBackend, FileImageStore, HttpWorkerClient, HttpWorkerClientConfig, LoggingRewardIssuer,
    SystemClock,
};
use sdrelay::infrastructure::events::EventPublisher;
use sdrelay::infrastructure::http::{worker_app, WorkerState};
use sdrelay::infrastructure::persistence::sqlite::{create_pool, run_migrations, DatabaseConfig};
use sdrelay::infrastructure::persistence::SqliteTaskStore;
use sdrelay::infrastructure::relay::{OriginRelay, OriginRelayConfig, WorkerService};

fn txt2img_task(prompt: &str, reward: Option<u64>) -> Task {
    let mut options = Txt2ImgOptions::default();
    options.sampling.prompt = Some(prompt.to_string());
    Task::new(
        RequesterId::new("0xabc").unwrap(),
        GenerationRequest::TextToImage(options),
        reward.map(|amount| RewardSpec {
            kind: "token".to_string(),
            amount,
            memo: None,
        }),
    )
}

async fn sqlite_store() -> Arc<SqliteTaskStore> {
    let pool = create_pool(&DatabaseConfig::in_memory()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    Arc::new(SqliteTaskStore::new(pool))
}

/// 在随机端口上启动 worker 侧 HTTP 服务
async fn spawn_worker(backend: Arc<FakeBackend>) -> String {
    let service = WorkerService::new(
        Arc::new(GenerationClient::new(backend.clone(), GenerationDefaults::default())),
        Arc::new(BackendCatalog::new(backend)),
        None,
    );
    let app = worker_app(Arc::new(WorkerState::new(
        Arc::new(service),
        CancellationToken::new(),
    )));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn failing_task_is_marked_failed_and_next_task_succeeds() {
    let png = ImageCodec::encode_blocking(&ImageHandle::new(DynamicImage::ImageRgb8(
        RgbImage::from_pixel(4, 4, Rgb([200, 100, 50])),
    )))
    .unwrap();

    let backend = Arc::new(FakeBackend::new());
    backend
        .on_post(
            "/sdapi/v1/txt2img",
            Err(BackendError::Status {
                status: 500,
                body: "CUDA out of memory".to_string(),
            }),
        )
        .on_post(
            "/sdapi/v1/txt2img",
            Ok(json!({ "images": [png], "parameters": {}, "info": "{\"seed\": 7}" })),
        );
    let worker_url = spawn_worker(backend.clone()).await;

    let store = sqlite_store().await;
    let first = txt2img_task("a broken request", None);
    let second = txt2img_task("a lighthouse", Some(5));
    store.enqueue(&first).await.unwrap();
    store.enqueue(&second).await.unwrap();

    let image_dir = tempfile::tempdir().unwrap();
    let image_store = Arc::new(FileImageStore::new(image_dir.path()).await.unwrap());
    let events = Arc::new(EventPublisher::new());
    let mut rx = events.subscribe();

    let relay = OriginRelay::new(
        OriginRelayConfig {
            instance_id: "origin-it".to_string(),
            ..Default::default()
        },
        store.clone(),
        Arc::new(
            HttpWorkerClient::new(HttpWorkerClientConfig {
                base_url: worker_url,
                timeout_secs: 30,
            })
            .unwrap(),
        ),
        image_store.clone(),
        Arc::new(LoggingRewardIssuer::new()),
        events.clone(),
        Arc::new(SystemClock),
    );

    assert_eq!(relay.process_next().await.unwrap(), Some(*first.id()));
    assert_eq!(relay.process_next().await.unwrap(), Some(*second.id()));
    assert_eq!(relay.process_next().await.unwrap(), None);

    let failed = store.find_by_id(first.id()).await.unwrap().unwrap();
    assert_eq!(failed.status(), TaskStatus::Failed);
    assert!(failed.error().unwrap().contains("CUDA out of memory"));
    assert!(failed.result_ref().is_none());

    let done = store.find_by_id(second.id()).await.unwrap().unwrap();
    assert_eq!(done.status(), TaskStatus::Completed);
    let result_ref = done.result_ref().unwrap();
    assert!(image_store.resolve(result_ref).exists());

    // 第二个任务的提示词原样到达后端
    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].body.as_ref().unwrap()["prompt"], "a lighthouse");

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.len(), 4);
    assert!(matches!(seen[0], RelayEvent::TaskDispatched { .. }));
    assert!(matches!(seen[1], RelayEvent::TaskFailed { .. }));
    assert!(matches!(seen[2], RelayEvent::TaskDispatched { .. }));
    assert!(matches!(seen[3], RelayEvent::TaskCompleted { .. }));
}

/// 总是成功并记录收到的任务
#[derive(Default)]
struct CountingWorker {
    jobs: Mutex<Vec<String>>,
}

#[async_trait]
impl WorkerDispatchPort for CountingWorker {
    async fn dispatch(&self, job: &RelayJob) -> Result<GenerationResult, RelayError> {
        self.jobs.lock().unwrap().push(job.task_id.clone());
        tokio::task::yield_now().await;
        Ok(GenerationResult {
            images: vec![ImageHandle::new(DynamicImage::new_rgb8(1, 1))],
            ..Default::default()
        })
    }
}

#[tokio::test]
async fn two_origin_instances_never_dispatch_the_same_task() {
    let store = sqlite_store().await;
    for n in 0..12 {
        store
            .enqueue(&txt2img_task(&format!("prompt {}", n), None))
            .await
            .unwrap();
    }

    let worker = Arc::new(CountingWorker::default());
    let image_dir = tempfile::tempdir().unwrap();
    let image_store = Arc::new(FileImageStore::new(image_dir.path()).await.unwrap());

    let make_relay = |instance: &str| {
        Arc::new(OriginRelay::new(
            OriginRelayConfig {
                instance_id: instance.to_string(),
                ..Default::default()
            },
            store.clone(),
            worker.clone(),
            image_store.clone(),
            Arc::new(LoggingRewardIssuer::new()),
            Arc::new(EventPublisher::new()),
            Arc::new(SystemClock),
        ))
    };

    let mut handles = Vec::new();
    for relay in [make_relay("origin-a"), make_relay("origin-b")] {
        handles.push(tokio::spawn(async move {
            let mut processed = 0;
            while relay.process_next().await.unwrap().is_some() {
                processed += 1;
            }
            processed
        }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 12);

    let jobs = worker.jobs.lock().unwrap().clone();
    let unique: HashSet<_> = jobs.iter().collect();
    assert_eq!(jobs.len(), 12);
    assert_eq!(unique.len(), 12);

    let tasks = store
        .list_by_requester(&RequesterId::new("0xabc").unwrap())
        .await
        .unwrap();
    assert_eq!(tasks.len(), 12);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Completed));
}
