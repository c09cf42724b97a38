use async_trait::async_trait;
use mailroom_common::{PagedResult, Pagination, UserId};
use mailroom_errors::AppResult;

use crate::dispatch::domain::entities::{DeliveryBatch, DeliveryId, DeliveryRecord, MailRef};

/// 投递记录查询条件
#[derive(Debug, Clone)]
pub struct DeliveryFilter {
    pub mail: MailRef,
}

#[async_trait]
pub trait DeliveryRepository: Send + Sync {
    async fn find_by_id(&self, id: &DeliveryId) -> AppResult<Option<DeliveryRecord>>;

    async fn find(&self, filter: &DeliveryFilter) -> AppResult<Option<DeliveryRecord>>;

    /// 按版本条件更新，返回递增版本后的记录
    ///
    /// 版本不匹配返回 Conflict，记录不存在或已删除返回 NotFound
    async fn update_by_id(&self, record: &DeliveryRecord) -> AppResult<DeliveryRecord>;

    /// 软删除
    async fn delete_by_id(&self, id: &DeliveryId, deleted_by: UserId) -> AppResult<()>;

    async fn index(&self, owner_id: &UserId, pagination: &Pagination) -> AppResult<PagedResult<DeliveryRecord>>;

    async fn find_batch(&self, delivery_id: &DeliveryId, batch_index: i32) -> AppResult<Option<DeliveryBatch>>;

    /// 写入或覆盖批次结果，投递记录不存在时返回 NotFound
    async fn save_batch(&self, batch: &DeliveryBatch) -> AppResult<()>;

    /// 按批次序号排序
    async fn list_batches(&self, delivery_id: &DeliveryId) -> AppResult<Vec<DeliveryBatch>>;
}
