//! 任务队列 trait 定义

use async_trait::async_trait;
use mailroom_errors::AppResult;

/// 任务队列 trait
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 投递任务，broker 确认接收后返回消息 ID
    async fn enqueue(&self, queue: &str, payload: &str) -> AppResult<String>;
}
