//! Kafka Consumer
//!
//! 消息处理成功，或失败后成功写入 DLQ，才提交 offset；
//! DLQ 也写入失败时回退到该 offset 重新消费

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use mailroom_common::{RetryConfig, with_conditional_retry};
use mailroom_config::KafkaConfig;
use mailroom_errors::{AppError, AppResult};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::Offset;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Kafka Consumer 配置
#[derive(Debug, Clone)]
pub struct KafkaConsumerConfig {
    pub brokers: String,
    pub group_id: String,
    pub topics: Vec<String>,
    /// 首次失败后的最大重试次数
    pub max_retries: u32,
    /// DLQ topic，未设置时为 `{topic}.dlq`
    pub dlq_topic: Option<String>,
    /// 额外的 librdkafka 配置项（SASL 等）
    pub extra: Vec<(String, String)>,
}

impl KafkaConsumerConfig {
    pub fn new(brokers: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: group_id.into(),
            topics: Vec::new(),
            max_retries: 3,
            dlq_topic: None,
            extra: Vec::new(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topics.push(topic.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_dlq_topic(mut self, topic: impl Into<String>) -> Self {
        self.dlq_topic = Some(topic.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((key.into(), value.into()));
        self
    }

    /// 某个 topic 对应的 DLQ
    pub fn dlq_for(&self, topic: &str) -> String {
        self.dlq_topic
            .clone()
            .unwrap_or_else(|| format!("{}.dlq", topic))
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            self.max_retries + 1,
            Duration::from_millis(100),
            Duration::from_secs(10),
        )
    }

    fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new();
        client.set("bootstrap.servers", &self.brokers);
        for (key, value) in &self.extra {
            client.set(key, value);
        }
        client
    }
}

impl From<&KafkaConfig> for KafkaConsumerConfig {
    fn from(config: &KafkaConfig) -> Self {
        let mut consumer = KafkaConsumerConfig::new(&config.brokers, &config.group_id)
            .with_topic(&config.topic)
            .with_max_retries(config.max_retries);

        if let Some(dlq) = &config.dlq_topic {
            consumer = consumer.with_dlq_topic(dlq);
        }
        if let Some(protocol) = &config.security_protocol {
            consumer = consumer.with_option("security.protocol", protocol);
        }
        if let Some(mechanism) = &config.sasl_mechanism {
            consumer = consumer.with_option("sasl.mechanisms", mechanism);
        }
        if let Some(username) = &config.sasl_username {
            consumer = consumer.with_option("sasl.username", username);
        }
        if let Some(password) = &config.sasl_password {
            consumer = consumer.with_option("sasl.password", password.expose_secret());
        }
        consumer
    }
}

/// 消费的消息
#[derive(Debug, Clone)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: String,
    pub timestamp: Option<i64>,
}

/// DLQ 消息元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMetadata {
    pub original_topic: String,
    pub original_partition: i32,
    pub original_offset: i64,
    pub error_message: String,
    pub retry_count: u32,
    pub failed_at: i64,
}

/// DLQ 消息包装
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqMessage {
    pub metadata: DlqMetadata,
    pub payload: String,
}

/// Kafka Event Consumer
pub struct KafkaEventConsumer {
    consumer: StreamConsumer,
    dlq_producer: FutureProducer,
    config: KafkaConsumerConfig,
}

impl KafkaEventConsumer {
    pub fn new(config: KafkaConsumerConfig) -> AppResult<Self> {
        let consumer: StreamConsumer = config
            .client_config()
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| AppError::internal(format!("Failed to create Kafka consumer: {}", e)))?;

        let topics: Vec<&str> = config.topics.iter().map(|s| s.as_str()).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| AppError::internal(format!("Failed to subscribe to topics: {}", e)))?;

        let dlq_producer: FutureProducer = config
            .client_config()
            .set("client.id", format!("{}-dlq-producer", config.group_id))
            .create()
            .map_err(|e| AppError::internal(format!("Failed to create DLQ producer: {}", e)))?;

        info!(
            group_id = %config.group_id,
            topics = ?config.topics,
            "Kafka consumer created"
        );

        Ok(Self {
            consumer,
            dlq_producer,
            config,
        })
    }

    /// 开始消费，直到 `shutdown` 被取消
    ///
    /// handler 返回可重试错误时按指数退避重试，最终失败写入 DLQ
    pub async fn run<F, Fut>(&self, handler: F, shutdown: CancellationToken) -> AppResult<()>
    where
        F: Fn(ConsumedMessage) -> Fut + Send + Sync,
        Fut: Future<Output = AppResult<()>> + Send,
    {
        let mut stream = self.consumer.stream();

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = stream.next() => next,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    error!("Kafka error: {}", e);
                    continue;
                }
                None => break,
            };

            let Some(consumed) = Self::to_consumed(&message) else {
                // 空消息或非 UTF-8 负载
                self.dead_letter_or_rewind(&message, "", "Empty or non UTF-8 payload", 0)
                    .await?;
                continue;
            };

            let result = with_conditional_retry(
                &self.config.retry_config(),
                "kafka_message_handler",
                || handler(consumed.clone()),
                AppError::is_retryable,
            )
            .await;

            match result {
                Ok(()) => self.commit(&message),
                Err(e) => {
                    error!(
                        topic = %consumed.topic,
                        partition = consumed.partition,
                        offset = consumed.offset,
                        error = %e,
                        "Failed to process message after retries"
                    );
                    self.dead_letter_or_rewind(
                        &message,
                        &consumed.payload,
                        &e.to_string(),
                        self.config.max_retries,
                    )
                    .await?;
                }
            }
        }

        info!("Kafka consumer stopped");
        Ok(())
    }

    fn to_consumed(message: &BorrowedMessage<'_>) -> Option<ConsumedMessage> {
        let payload = match message.payload_view::<str>() {
            Some(Ok(s)) => s.to_string(),
            _ => return None,
        };

        Some(ConsumedMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            key: message
                .key_view::<str>()
                .and_then(|r| r.ok())
                .map(|s| s.to_string()),
            payload,
            timestamp: message.timestamp().to_millis(),
        })
    }

    fn commit(&self, message: &BorrowedMessage<'_>) {
        if let Err(e) = self.consumer.commit_message(message, CommitMode::Async) {
            error!("Failed to commit offset: {}", e);
        }
    }

    /// 写入 DLQ 后提交；DLQ 不可用则不提交并回退 offset
    async fn dead_letter_or_rewind(
        &self,
        message: &BorrowedMessage<'_>,
        payload: &str,
        error_message: &str,
        retry_count: u32,
    ) -> AppResult<()> {
        let topic = message.topic();
        let partition = message.partition();
        let offset = message.offset();

        match self
            .send_to_dlq(topic, partition, offset, payload, error_message, retry_count)
            .await
        {
            Ok(()) => {
                self.commit(message);
                Ok(())
            }
            Err(dlq_err) => {
                error!(
                    topic = %topic,
                    partition,
                    offset,
                    error = %dlq_err,
                    "Failed to send to DLQ, rewinding"
                );
                tokio::time::sleep(self.config.retry_config().max_delay).await;
                self.consumer
                    .seek(topic, partition, Offset::Offset(offset), Duration::from_secs(5))
                    .map_err(|e| {
                        AppError::internal(format!("Failed to rewind offset {offset}: {e}"))
                    })
            }
        }
    }

    async fn send_to_dlq(
        &self,
        original_topic: &str,
        partition: i32,
        offset: i64,
        payload: &str,
        error_message: &str,
        retry_count: u32,
    ) -> AppResult<()> {
        let dlq_topic = self.config.dlq_for(original_topic);

        let dlq_message = DlqMessage {
            metadata: DlqMetadata {
                original_topic: original_topic.to_string(),
                original_partition: partition,
                original_offset: offset,
                error_message: error_message.to_string(),
                retry_count,
                failed_at: chrono::Utc::now().timestamp(),
            },
            payload: payload.to_string(),
        };

        let dlq_payload = serde_json::to_string(&dlq_message)
            .map_err(|e| AppError::internal(format!("Failed to serialize DLQ message: {}", e)))?;

        let record: FutureRecord<'_, str, String> = FutureRecord::to(&dlq_topic)
            .payload(&dlq_payload)
            .key(original_topic);

        self.dlq_producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .map_err(|(e, _)| AppError::broker_unavailable(format!("Failed to send to DLQ: {}", e)))?;

        warn!(
            dlq_topic = %dlq_topic,
            original_topic = %original_topic,
            partition,
            offset,
            error = %error_message,
            "Message sent to DLQ"
        );

        Ok(())
    }

    pub fn group_id(&self) -> &str {
        &self.config.group_id
    }
}
