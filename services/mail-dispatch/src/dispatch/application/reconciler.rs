//! 投递对账
//!
//! 保存批次结果，并由全部批次重新计算投递记录的汇总。
//! 汇总写入带版本条件，冲突时重读重算。记录已不存在时只告警。

use std::future::Future;
use std::sync::Arc;

use mailroom_errors::{AppError, AppResult};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::dispatch::domain::entities::{DeliveryBatch, DeliveryId, DeliveryRecord};
use crate::dispatch::domain::repositories::DeliveryRepository;

const MAX_CONFLICT_RETRIES: usize = 3;

pub struct DeliveryReconciler {
    deliveries: Arc<dyn DeliveryRepository>,
    provider_name: String,
}

impl DeliveryReconciler {
    pub fn new(deliveries: Arc<dyn DeliveryRepository>, provider_name: impl Into<String>) -> Self {
        Self {
            deliveries,
            provider_name: provider_name.into(),
        }
    }

    /// 该批次是否已由同一任务发送成功
    pub async fn is_batch_sent(&self, delivery_id: DeliveryId, batch_index: i32, job_id: Uuid) -> bool {
        match self.deliveries.find_batch(&delivery_id, batch_index).await {
            Ok(Some(batch)) => batch.is_sent() && batch.job_id == job_id,
            Ok(None) => false,
            Err(e) => {
                warn!(%delivery_id, batch_index, error = %e, "Failed to look up batch result");
                false
            }
        }
    }

    /// 记录一个批次的结果并刷新汇总
    pub async fn record_batch(&self, batch: DeliveryBatch) {
        let delivery_id = batch.delivery_id;
        match self.deliveries.save_batch(&batch).await {
            Ok(()) => {}
            Err(AppError::NotFound(_)) => {
                warn!(%delivery_id, batch_index = batch.batch_index, "Delivery record missing, batch result dropped");
                return;
            }
            Err(e) => {
                error!(%delivery_id, batch_index = batch.batch_index, error = %e, "Failed to save batch result");
                return;
            }
        }

        self.update_with_retry(delivery_id, |mut record| async move {
            let batches = self.deliveries.list_batches(&record.id).await?;
            record.apply_batches(&self.provider_name, &batches);
            Ok(record)
        })
        .await;
    }

    /// 整体失败：未发送任何批次
    pub async fn record_failure(&self, delivery_id: DeliveryId, recipients: usize, comment: &str) {
        self.update_with_retry(delivery_id, |mut record| async move {
            record.record_failure(&self.provider_name, recipients, comment);
            Ok(record)
        })
        .await;
    }

    async fn update_with_retry<F, Fut>(&self, delivery_id: DeliveryId, mut apply: F)
    where
        F: FnMut(DeliveryRecord) -> Fut,
        Fut: Future<Output = AppResult<DeliveryRecord>>,
    {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let record = match self.deliveries.find_by_id(&delivery_id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    warn!(%delivery_id, "Delivery record not found, skipping update");
                    return;
                }
                Err(e) => {
                    error!(%delivery_id, error = %e, "Failed to load delivery record");
                    return;
                }
            };

            let updated = match apply(record).await {
                Ok(updated) => updated,
                Err(e) => {
                    error!(%delivery_id, error = %e, "Failed to compute delivery summary");
                    return;
                }
            };

            match self.deliveries.update_by_id(&updated).await {
                Ok(saved) => {
                    debug!(
                        %delivery_id,
                        status = saved.status.as_str(),
                        sent = saved.sent_recipients,
                        total = saved.total_recipients,
                        "Delivery record updated"
                    );
                    return;
                }
                Err(AppError::Conflict(_)) => {
                    debug!(%delivery_id, attempt, "Delivery record changed concurrently, retrying");
                }
                Err(AppError::NotFound(_)) => {
                    warn!(%delivery_id, "Delivery record deleted, skipping update");
                    return;
                }
                Err(e) => {
                    error!(%delivery_id, error = %e, "Failed to update delivery record");
                    return;
                }
            }
        }

        error!(%delivery_id, "Gave up updating delivery record after repeated conflicts");
    }
}
