//! Mail Dispatch Service
//!
//! 启动发送 Worker；配置了 Kafka 时同时消费群发事件

use std::sync::Arc;

use mail_dispatch::account::domain::services::CredentialVault;
use mail_dispatch::account::infrastructure::persistence::PostgresAccountRepository;
use mail_dispatch::dispatch::application::{
    BatchedSendEngine, BulkMailEventListener, DeliveryReconciler, DispatchOutbox, MailDispatchService,
    TaskDispatcher,
};
use mail_dispatch::dispatch::infrastructure::persistence::{
    PostgresDeliveryRepository, PostgresMailOutboxStore, PostgresMailRepository,
};
use mail_dispatch::dispatch::infrastructure::{MailWorker, MailWorkerConfig};
use mail_dispatch::template::application::TemplateRenderer;
use mail_dispatch::template::infrastructure::persistence::PostgresTemplateRepository;
use mailroom_adapter_email::{MailTransport, SmtpMailTransport};
use mailroom_adapter_kafka::{ConsumedMessage, KafkaConsumerConfig, KafkaEventConsumer};
use mailroom_adapter_postgres::{TransactionManager, run_migrations};
use mailroom_adapter_redis::RedisTaskQueue;
use mailroom_adapter_storage::FileSystemStorage;
use mailroom_bootstrap::Infrastructure;
use mailroom_errors::AppResult;
use mailroom_ports::ObjectStorage;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Stream 保留的最大任务数
const STREAM_MAX_LEN: usize = 100_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_dir = std::env::var("MAILROOM_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    mailroom_bootstrap::run(&config_dir, serve).await
}

async fn serve(infra: Infrastructure, shutdown: CancellationToken) -> AppResult<()> {
    let config = infra.config().clone();
    let pool = infra.postgres_pool();

    if let Some(dir) = &config.database.migrations_dir {
        run_migrations(&pool, dir).await?;
    }

    let remote = FileSystemStorage::new(&config.storage.remote_root);
    remote.initialize().await?;
    let cache = FileSystemStorage::new(&config.storage.cache_root);
    cache.initialize().await?;
    let remote: Arc<dyn ObjectStorage> = Arc::new(remote);
    let cache: Arc<dyn ObjectStorage> = Arc::new(cache);

    let accounts = Arc::new(PostgresAccountRepository::new(pool.clone()));
    let templates = Arc::new(PostgresTemplateRepository::new(pool.clone()));
    let mails = Arc::new(PostgresMailRepository::new(pool.clone()));
    let deliveries = Arc::new(PostgresDeliveryRepository::new(pool.clone()));
    let outbox_store = Arc::new(PostgresMailOutboxStore::new(TransactionManager::new(pool)));

    // 执行侧
    let vault = Arc::new(CredentialVault::from_config(&config.vault));
    let transport: Arc<dyn MailTransport> = Arc::new(SmtpMailTransport::new(config.smtp.clone()));
    let reconciler = DeliveryReconciler::new(deliveries.clone(), transport.provider_name());
    let engine = Arc::new(
        BatchedSendEngine::new(accounts.clone(), vault, transport, reconciler)
            .with_batch_size(config.dispatch.batch_size),
    );

    let consumer_prefix = std::env::var("HOSTNAME")
        .unwrap_or_else(|_| format!("{}-{}", config.app_name, std::process::id()));
    let worker = Arc::new(MailWorker::new(
        config.redis.url.clone(),
        engine,
        MailWorkerConfig::from_dispatch(&config.dispatch, consumer_prefix),
    ));
    let workers = worker.start(shutdown.clone());

    // 请求侧
    let queue = Arc::new(RedisTaskQueue::new(infra.redis_connection_manager()).with_max_len(STREAM_MAX_LEN));
    let service = Arc::new(MailDispatchService::new(
        DispatchOutbox::new(accounts, outbox_store),
        TaskDispatcher::new(queue, config.dispatch.stream.clone()),
        Arc::new(TemplateRenderer::new(templates, remote, cache)),
        mails,
        deliveries,
    ));

    match &config.kafka {
        Some(kafka) => {
            let consumer = KafkaEventConsumer::new(KafkaConsumerConfig::from(kafka))?;
            let listener = Arc::new(BulkMailEventListener::new(service));
            info!(topic = %kafka.topic, group = %consumer.group_id(), "Consuming bulk mail events");

            consumer
                .run(
                    move |message: ConsumedMessage| {
                        let listener = Arc::clone(&listener);
                        async move { listener.handle(&message.payload).await }
                    },
                    shutdown.clone(),
                )
                .await?;
        }
        None => shutdown.cancelled().await,
    }

    futures::future::join_all(workers).await;
    Ok(())
}
