use async_trait::async_trait;
use mailroom_common::{PagedResult, Pagination, UserId};
use mailroom_errors::AppResult;

use crate::dispatch::domain::entities::{MailId, MailKind, MailRecord};

/// 邮件查询条件
#[derive(Debug, Clone)]
pub struct MailFilter {
    pub owner_id: UserId,
    pub kind: Option<MailKind>,
}

/// 邮件记录只读访问，写入通过 [`MailOutboxStore`](super::MailOutboxStore)
#[async_trait]
pub trait MailRepository: Send + Sync {
    async fn find_by_id(&self, id: &MailId) -> AppResult<Option<MailRecord>>;

    /// 软删除
    async fn delete_by_id(&self, id: &MailId, deleted_by: UserId) -> AppResult<()>;

    async fn index(&self, filter: &MailFilter, pagination: &Pagination) -> AppResult<PagedResult<MailRecord>>;
}
