use async_trait::async_trait;
use mailroom_common::{PagedResult, Pagination, UserId};
use mailroom_errors::AppResult;

use crate::template::domain::entities::{MailTemplate, TemplateId};

/// 模板查询条件，始终限定所有者
#[derive(Debug, Clone)]
pub struct TemplateFilter {
    pub owner_id: UserId,
    pub id: Option<TemplateId>,
    pub name: Option<String>,
}

impl TemplateFilter {
    pub fn by_id(owner_id: UserId, id: TemplateId) -> Self {
        Self {
            owner_id,
            id: Some(id),
            name: None,
        }
    }

    pub fn by_name(owner_id: UserId, name: impl Into<String>) -> Self {
        Self {
            owner_id,
            id: None,
            name: Some(name.into()),
        }
    }
}

#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// 新建模板，同名时返回 Conflict
    async fn create(&self, template: &MailTemplate) -> AppResult<()>;

    async fn find_by_id(&self, id: &TemplateId) -> AppResult<Option<MailTemplate>>;

    async fn find(&self, filter: &TemplateFilter) -> AppResult<Option<MailTemplate>>;

    /// 更新模板，不存在时返回 NotFound
    async fn update_by_id(&self, template: &MailTemplate) -> AppResult<()>;

    /// 仅在内容引用未变时记录缓存 ID，返回是否写入
    async fn set_cache_id(&self, id: &TemplateId, storage_reference: &str, cache_id: &str) -> AppResult<bool>;

    /// 软删除
    async fn delete_by_id(&self, id: &TemplateId, deleted_by: UserId) -> AppResult<()>;

    async fn index(&self, owner_id: &UserId, pagination: &Pagination) -> AppResult<PagedResult<MailTemplate>>;
}
