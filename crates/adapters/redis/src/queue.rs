//! 基于 Redis Stream 的任务队列

use async_trait::async_trait;
use mailroom_errors::AppResult;
use mailroom_ports::TaskQueue;
use redis::aio::ConnectionManager;

use crate::StreamProducer;

/// 任务载荷所在字段
pub const JOB_FIELD: &str = "job";

/// Redis 任务队列
#[derive(Clone)]
pub struct RedisTaskQueue {
    conn: ConnectionManager,
    max_len: Option<usize>,
}

impl RedisTaskQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, max_len: None }
    }

    /// 限制 Stream 长度，避免已确认任务无限堆积
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, queue: &str, payload: &str) -> AppResult<String> {
        let mut producer = StreamProducer::from_connection(self.conn.clone());
        if let Some(max_len) = self.max_len {
            producer = producer.with_max_len(max_len);
        }
        producer.xadd(queue, &[(JOB_FIELD, payload)]).await
    }
}
