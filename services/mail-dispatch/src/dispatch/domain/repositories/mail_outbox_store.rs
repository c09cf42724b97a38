use async_trait::async_trait;
use mailroom_errors::AppResult;

use crate::dispatch::domain::entities::{DeliveryRecord, MailRecord};

/// 发件箱存储
#[async_trait]
pub trait MailOutboxStore: Send + Sync {
    /// 在同一事务中写入邮件记录和投递记录，任一失败则都不写入
    async fn create(&self, mail: &MailRecord, delivery: &DeliveryRecord) -> AppResult<()>;
}
