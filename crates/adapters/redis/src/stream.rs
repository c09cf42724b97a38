//! Redis Stream 模块
//!
//! 任务以单个字段写入 Stream，消费者组保证每个任务只分配给一个 worker

use std::collections::HashMap;

use mailroom_errors::{AppError, AppResult};
use redis::aio::ConnectionManager;
use redis::{RedisResult, Value};
use tracing::{debug, info};

/// Stream 消息
#[derive(Debug, Clone)]
pub struct StreamMessage {
    /// 消息 ID
    pub id: String,
    /// Stream 名称
    pub stream: String,
    /// 消息字段
    pub fields: HashMap<String, String>,
}

impl StreamMessage {
    /// 获取字段值
    pub fn get(&self, key: &str) -> Option<&String> {
        self.fields.get(key)
    }
}

/// Stream 生产者
pub struct StreamProducer {
    conn: ConnectionManager,
    max_len: Option<usize>,
}

impl StreamProducer {
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self { conn, max_len: None }
    }

    /// 设置最大长度（近似裁剪）
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }

    /// 添加消息到 Stream
    pub async fn xadd(&mut self, stream: &str, fields: &[(&str, &str)]) -> AppResult<String> {
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream);

        if let Some(max_len) = self.max_len {
            cmd.arg("MAXLEN").arg("~").arg(max_len);
        }

        cmd.arg("*");

        for (key, value) in fields {
            cmd.arg(*key).arg(*value);
        }

        let id: String = cmd
            .query_async(&mut self.conn)
            .await
            .map_err(|e| AppError::broker_unavailable(format!("Failed to XADD: {}", e)))?;

        debug!(stream = %stream, id = %id, "Message added to stream");
        Ok(id)
    }
}

/// Stream 消费者
pub struct StreamConsumer {
    conn: ConnectionManager,
    group: String,
    consumer: String,
    block_ms: Option<usize>,
}

impl StreamConsumer {
    pub fn from_connection(
        conn: ConnectionManager,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            group: group.into(),
            consumer: consumer.into(),
            block_ms: Some(5000),
        }
    }

    /// 设置阻塞超时（毫秒）
    pub fn with_block_ms(mut self, ms: usize) -> Self {
        self.block_ms = Some(ms);
        self
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer
    }

    /// 创建消费者组（如果不存在）
    pub async fn create_group(&mut self, stream: &str, start_id: &str) -> AppResult<()> {
        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(&self.group)
            .arg(start_id)
            .arg("MKSTREAM")
            .query_async(&mut self.conn)
            .await;

        match result {
            Ok(()) => {
                info!(stream = %stream, group = %self.group, "Consumer group created");
                Ok(())
            }
            // 组已存在
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(stream = %stream, group = %self.group, "Consumer group already exists");
                Ok(())
            }
            Err(e) => Err(AppError::broker_unavailable(format!(
                "Failed to create group: {}",
                e
            ))),
        }
    }

    /// 读取新消息
    pub async fn xreadgroup(&mut self, stream: &str, count: usize) -> AppResult<Vec<StreamMessage>> {
        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.group)
            .arg(&self.consumer)
            .arg("COUNT")
            .arg(count);

        if let Some(block_ms) = self.block_ms {
            cmd.arg("BLOCK").arg(block_ms);
        }

        cmd.arg("STREAMS").arg(stream).arg(">");

        let result: Value = cmd
            .query_async(&mut self.conn)
            .await
            .map_err(|e| AppError::broker_unavailable(format!("Failed to XREADGROUP: {}", e)))?;

        Ok(parse_xread_response(result))
    }

    /// 确认消息
    pub async fn xack(&mut self, stream: &str, ids: &[&str]) -> AppResult<usize> {
        let mut cmd = redis::cmd("XACK");
        cmd.arg(stream).arg(&self.group);
        for id in ids {
            cmd.arg(*id);
        }

        let acked: usize = cmd
            .query_async(&mut self.conn)
            .await
            .map_err(|e| AppError::broker_unavailable(format!("Failed to XACK: {}", e)))?;

        debug!(stream = %stream, acked, "Messages acknowledged");
        Ok(acked)
    }

    /// 查询空闲超过 `min_idle_ms` 的待确认消息
    pub async fn xpending(
        &mut self,
        stream: &str,
        min_idle_ms: usize,
        count: usize,
    ) -> AppResult<Vec<PendingMessage>> {
        let result: Value = redis::cmd("XPENDING")
            .arg(stream)
            .arg(&self.group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut self.conn)
            .await
            .map_err(|e| AppError::broker_unavailable(format!("Failed to XPENDING: {}", e)))?;

        Ok(parse_xpending_response(result))
    }

    /// 认领超时的消息
    pub async fn xclaim(
        &mut self,
        stream: &str,
        min_idle_ms: usize,
        ids: &[&str],
    ) -> AppResult<Vec<StreamMessage>> {
        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(stream)
            .arg(&self.group)
            .arg(&self.consumer)
            .arg(min_idle_ms);

        for id in ids {
            cmd.arg(*id);
        }

        let result: Value = cmd
            .query_async(&mut self.conn)
            .await
            .map_err(|e| AppError::broker_unavailable(format!("Failed to XCLAIM: {}", e)))?;

        Ok(parse_entries(&result, stream))
    }
}

/// 待处理消息信息
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub id: String,
    pub consumer: String,
    pub idle_ms: u64,
    /// 投递次数
    pub delivery_count: u64,
}

fn bulk_string(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(s) => Some(String::from_utf8_lossy(s).to_string()),
        Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

/// 解析 `[[id, [k, v, ...]], ...]` 形式的条目列表
fn parse_entries(value: &Value, stream: &str) -> Vec<StreamMessage> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let Value::Array(parts) = entry else {
                return None;
            };
            let id = bulk_string(parts.first()?)?;

            let mut fields = HashMap::new();
            if let Some(Value::Array(field_values)) = parts.get(1) {
                for pair in field_values.chunks(2) {
                    if let [k, v] = pair {
                        if let (Some(k), Some(v)) = (bulk_string(k), bulk_string(v)) {
                            fields.insert(k, v);
                        }
                    }
                }
            }

            Some(StreamMessage {
                id,
                stream: stream.to_string(),
                fields,
            })
        })
        .collect()
}

/// 解析 XREADGROUP 响应：`[[stream, entries], ...]`，超时返回 Nil
fn parse_xread_response(value: Value) -> Vec<StreamMessage> {
    let Value::Array(streams) = value else {
        return Vec::new();
    };

    streams
        .iter()
        .filter_map(|stream_data| match stream_data {
            Value::Array(parts) if parts.len() >= 2 => {
                let name = bulk_string(&parts[0])?;
                Some(parse_entries(&parts[1], &name))
            }
            _ => None,
        })
        .flatten()
        .collect()
}

/// 解析 XPENDING 扩展形式响应
fn parse_xpending_response(value: Value) -> Vec<PendingMessage> {
    let Value::Array(entries) = value else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::Array(parts) if parts.len() >= 4 => {
                let id = bulk_string(&parts[0])?;
                let consumer = bulk_string(&parts[1])?;
                let (Value::Int(idle), Value::Int(count)) = (&parts[2], &parts[3]) else {
                    return None;
                };
                Some(PendingMessage {
                    id,
                    consumer,
                    idle_ms: *idle as u64,
                    delivery_count: *count as u64,
                })
            }
            _ => None,
        })
        .collect()
}
