//! 发送任务 Worker
//!
//! 多个消费者加入同一 Redis Stream 消费组。每个消费者先认领空闲超时的待确认任务，
//! 再读取新任务；任务到达终态后才 XACK，进程崩溃时任务由其他消费者接管。

use std::sync::Arc;
use std::time::Duration;

use mailroom_adapter_redis::{JOB_FIELD, StreamConsumer, StreamMessage, create_connection_manager};
use mailroom_config::DispatchConfig;
use mailroom_errors::{AppError, AppResult};
use secrecy::{ExposeSecret, Secret};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatch::application::send_engine::BatchedSendEngine;
use crate::dispatch::domain::entities::SendMailJob;

const RETRY_DELAY: Duration = Duration::from_secs(1);
const CLAIM_BATCH: usize = 10;

/// Worker 配置
#[derive(Debug, Clone)]
pub struct MailWorkerConfig {
    pub stream: String,
    pub group: String,
    /// 消费者名称前缀，实际名称为 `{prefix}-{index}`
    pub consumer_prefix: String,
    pub concurrency: usize,
    pub block_ms: usize,
    /// 待确认任务空闲超过该时长即被认领
    pub claim_idle_ms: usize,
}

impl MailWorkerConfig {
    pub fn from_dispatch(config: &DispatchConfig, consumer_prefix: impl Into<String>) -> Self {
        Self {
            stream: config.stream.clone(),
            group: config.consumer_group.clone(),
            consumer_prefix: consumer_prefix.into(),
            concurrency: config.worker_concurrency.max(1),
            block_ms: config.block_ms,
            claim_idle_ms: config.claim_idle_ms,
        }
    }
}

pub struct MailWorker {
    redis_url: Secret<String>,
    engine: Arc<BatchedSendEngine>,
    config: MailWorkerConfig,
}

impl MailWorker {
    pub fn new(redis_url: Secret<String>, engine: Arc<BatchedSendEngine>, config: MailWorkerConfig) -> Self {
        Self {
            redis_url,
            engine,
            config,
        }
    }

    /// 启动全部消费者，收到关闭信号后在当前任务结束时退出
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> Vec<JoinHandle<()>> {
        (0..self.config.concurrency)
            .map(|index| tokio::spawn(Arc::clone(&self).run_consumer(index, shutdown.clone())))
            .collect()
    }

    async fn run_consumer(self: Arc<Self>, index: usize, shutdown: CancellationToken) {
        let name = format!("{}-{}", self.config.consumer_prefix, index);
        let Some(mut consumer) = self.open_consumer(&name, &shutdown).await else {
            return;
        };

        info!(consumer = %name, stream = %self.config.stream, "Mail worker started");

        while !shutdown.is_cancelled() {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.next_messages(&mut consumer) => next,
            };

            match next {
                Ok(messages) => {
                    for message in messages {
                        self.process(&mut consumer, message).await;
                    }
                }
                Err(e) => {
                    error!(consumer = %name, error = %e, "Failed to read send jobs");
                    pause(&shutdown).await;
                }
            }
        }

        info!(consumer = %name, "Mail worker stopped");
    }

    /// 每个消费者独占一条连接，阻塞读不影响其他消费者
    async fn open_consumer(&self, name: &str, shutdown: &CancellationToken) -> Option<StreamConsumer> {
        loop {
            match self.try_open_consumer(name).await {
                Ok(consumer) => return Some(consumer),
                Err(e) => {
                    error!(consumer = %name, error = %e, "Failed to join consumer group");
                    pause(shutdown).await;
                    if shutdown.is_cancelled() {
                        return None;
                    }
                }
            }
        }
    }

    async fn try_open_consumer(&self, name: &str) -> AppResult<StreamConsumer> {
        let conn = create_connection_manager(self.redis_url.expose_secret()).await?;
        let mut consumer =
            StreamConsumer::from_connection(conn, &self.config.group, name).with_block_ms(self.config.block_ms);
        consumer.create_group(&self.config.stream, "0").await?;
        Ok(consumer)
    }

    async fn next_messages(&self, consumer: &mut StreamConsumer) -> AppResult<Vec<StreamMessage>> {
        let stream = &self.config.stream;

        let pending = consumer.xpending(stream, self.config.claim_idle_ms, CLAIM_BATCH).await?;
        if !pending.is_empty() {
            let ids: Vec<&str> = pending.iter().map(|p| p.id.as_str()).collect();
            let claimed = consumer.xclaim(stream, self.config.claim_idle_ms, &ids).await?;
            if !claimed.is_empty() {
                warn!(
                    consumer = %consumer.consumer_name(),
                    count = claimed.len(),
                    "Reclaimed stale send jobs"
                );
                return Ok(claimed);
            }
        }

        consumer.xreadgroup(stream, 1).await
    }

    async fn process(&self, consumer: &mut StreamConsumer, message: StreamMessage) {
        let job = message
            .get(JOB_FIELD)
            .ok_or_else(|| AppError::validation(format!("Message has no '{}' field", JOB_FIELD)))
            .and_then(|payload| SendMailJob::from_payload(payload.as_str()));

        match job {
            Ok(job) => {
                debug!(message_id = %message.id, job_id = %job.job_id, "Send job received");
                self.engine.run(&job).await;
            }
            Err(e) => {
                error!(message_id = %message.id, error = %e, "Discarding undecodable send job");
            }
        }

        if let Err(e) = consumer.xack(&self.config.stream, &[message.id.as_str()]).await {
            error!(message_id = %message.id, error = %e, "Failed to acknowledge send job");
        }
    }
}

async fn pause(shutdown: &CancellationToken) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = tokio::time::sleep(RETRY_DELAY) => {}
    }
}
