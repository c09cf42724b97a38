use async_trait::async_trait;
use mailroom_common::{PagedResult, Pagination, UserId};
use mailroom_errors::AppResult;

use crate::account::domain::entities::{Account, AccountId};

/// 账户查询条件，只匹配未删除的账户
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    pub owner_id: Option<UserId>,
    /// 地址匹配忽略大小写
    pub address: Option<String>,
    pub is_default: Option<bool>,
}

impl AccountFilter {
    pub fn by_address(owner_id: UserId, address: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id),
            address: Some(address.into()),
            is_default: None,
        }
    }
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// 新建账户，地址已被登记时返回 Conflict
    async fn create(&self, account: &Account) -> AppResult<()>;

    async fn find_by_id(&self, id: &AccountId) -> AppResult<Option<Account>>;

    /// 按条件查找第一个匹配的账户
    async fn find(&self, filter: &AccountFilter) -> AppResult<Option<Account>>;

    /// 更新账户，不存在时返回 NotFound
    async fn update_by_id(&self, account: &Account) -> AppResult<()>;

    /// 软删除
    async fn delete_by_id(&self, id: &AccountId, deleted_by: UserId) -> AppResult<()>;

    async fn index(&self, owner_id: &UserId, pagination: &Pagination) -> AppResult<PagedResult<Account>>;
}
