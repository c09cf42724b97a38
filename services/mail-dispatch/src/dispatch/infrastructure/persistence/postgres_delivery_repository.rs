use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailroom_adapter_postgres::map_sqlx_error;
use mailroom_common::{PagedResult, Pagination, SoftDelete, UserId};
use mailroom_errors::{AppError, AppResult};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::dispatch::domain::entities::{
    BatchStatus, DeliveryBatch, DeliveryId, DeliveryRecord, DeliveryStatus, MailId, MailKind, MailRef,
};
use crate::dispatch::domain::repositories::{DeliveryFilter, DeliveryRepository};

const COLUMNS: &str = "id, owner_id, mail_id, mail_kind, provider_name, status, total_recipients, \
                       sent_recipients, comment, date_sent, version, created_at, updated_at, \
                       is_deleted, deleted_at, deleted_by";

const BATCH_COLUMNS: &str = "delivery_id, batch_index, job_id, recipients, status, comment, attempted_at";

pub struct PostgresDeliveryRepository {
    pool: PgPool,
}

impl PostgresDeliveryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryRepository for PostgresDeliveryRepository {
    async fn find_by_id(&self, id: &DeliveryId) -> AppResult<Option<DeliveryRecord>> {
        debug!("Finding delivery by id: {}", id);

        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            "SELECT {COLUMNS} FROM mail_deliveries WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find delivery: {}", e)))?;

        row.map(DeliveryRecord::try_from).transpose()
    }

    async fn find(&self, filter: &DeliveryFilter) -> AppResult<Option<DeliveryRecord>> {
        debug!("Finding delivery of mail: {}", filter.mail.mail_id());

        let row = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM mail_deliveries
            WHERE mail_id = $1 AND mail_kind = $2 AND is_deleted = FALSE
            "#
        ))
        .bind(filter.mail.mail_id().0)
        .bind(filter.mail.kind().as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find delivery: {}", e)))?;

        row.map(DeliveryRecord::try_from).transpose()
    }

    async fn update_by_id(&self, record: &DeliveryRecord) -> AppResult<DeliveryRecord> {
        debug!("Updating delivery {} at version {}", record.id, record.version);

        let result = sqlx::query(
            r#"
            UPDATE mail_deliveries
            SET provider_name = $3, status = $4, total_recipients = $5, sent_recipients = $6,
                comment = $7, date_sent = $8, updated_at = $9, version = version + 1
            WHERE id = $1 AND version = $2 AND is_deleted = FALSE
            "#,
        )
        .bind(record.id.0)
        .bind(record.version)
        .bind(&record.provider_name)
        .bind(record.status.as_str())
        .bind(record.total_recipients)
        .bind(record.sent_recipients)
        .bind(&record.comment)
        .bind(record.date_sent)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update delivery: {}", e)))?;

        if result.rows_affected() == 0 {
            return match self.find_by_id(&record.id).await? {
                Some(_) => Err(AppError::conflict(format!(
                    "Delivery {} was modified concurrently",
                    record.id
                ))),
                None => Err(AppError::not_found(format!("Delivery {} not found", record.id))),
            };
        }

        let mut saved = record.clone();
        saved.version += 1;
        Ok(saved)
    }

    async fn delete_by_id(&self, id: &DeliveryId, deleted_by: UserId) -> AppResult<()> {
        debug!("Deleting delivery: {}", id);

        let result = sqlx::query(
            r#"
            UPDATE mail_deliveries
            SET is_deleted = TRUE, deleted_at = NOW(), deleted_by = $2, version = version + 1
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id.0)
        .bind(deleted_by.0)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete delivery: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Delivery {} not found", id)));
        }
        Ok(())
    }

    async fn index(&self, owner_id: &UserId, pagination: &Pagination) -> AppResult<PagedResult<DeliveryRecord>> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM mail_deliveries WHERE owner_id = $1 AND is_deleted = FALSE",
        )
        .bind(owner_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count deliveries: {}", e)))?;

        let rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM mail_deliveries
            WHERE owner_id = $1 AND is_deleted = FALSE
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner_id.0)
        .bind(i64::from(pagination.page_size))
        .bind(i64::from(pagination.offset()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list deliveries: {}", e)))?;

        let items = rows
            .into_iter()
            .map(DeliveryRecord::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(PagedResult::new(items, total.0.max(0) as u64, pagination))
    }

    async fn find_batch(&self, delivery_id: &DeliveryId, batch_index: i32) -> AppResult<Option<DeliveryBatch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {BATCH_COLUMNS} FROM mail_delivery_batches WHERE delivery_id = $1 AND batch_index = $2"
        ))
        .bind(delivery_id.0)
        .bind(batch_index)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find delivery batch: {}", e)))?;

        row.map(DeliveryBatch::try_from).transpose()
    }

    async fn save_batch(&self, batch: &DeliveryBatch) -> AppResult<()> {
        debug!("Saving batch {} of delivery {}", batch.batch_index, batch.delivery_id);

        sqlx::query(
            r#"
            INSERT INTO mail_delivery_batches (delivery_id, batch_index, job_id, recipients,
                                               status, comment, attempted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (delivery_id, batch_index) DO UPDATE
            SET job_id = EXCLUDED.job_id, recipients = EXCLUDED.recipients, status = EXCLUDED.status,
                comment = EXCLUDED.comment, attempted_at = EXCLUDED.attempted_at
            "#,
        )
        .bind(batch.delivery_id.0)
        .bind(batch.batch_index)
        .bind(batch.job_id)
        .bind(&batch.recipients)
        .bind(batch.status.as_str())
        .bind(&batch.comment)
        .bind(batch.attempted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "Failed to save delivery batch"))?;

        Ok(())
    }

    async fn list_batches(&self, delivery_id: &DeliveryId) -> AppResult<Vec<DeliveryBatch>> {
        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {BATCH_COLUMNS} FROM mail_delivery_batches WHERE delivery_id = $1 ORDER BY batch_index"
        ))
        .bind(delivery_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list delivery batches: {}", e)))?;

        rows.into_iter().map(DeliveryBatch::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    owner_id: Uuid,
    mail_id: Uuid,
    mail_kind: String,
    provider_name: Option<String>,
    status: String,
    total_recipients: i32,
    sent_recipients: i32,
    comment: Option<String>,
    date_sent: Option<DateTime<Utc>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<Uuid>,
}

impl TryFrom<DeliveryRow> for DeliveryRecord {
    type Error = AppError;

    fn try_from(row: DeliveryRow) -> Result<Self, Self::Error> {
        let kind = row.mail_kind.parse::<MailKind>()?;
        Ok(DeliveryRecord {
            id: DeliveryId::from_uuid(row.id),
            owner_id: UserId::from_uuid(row.owner_id),
            mail: MailRef::new(kind, MailId::from_uuid(row.mail_id)),
            provider_name: row.provider_name,
            status: row.status.parse::<DeliveryStatus>()?,
            total_recipients: row.total_recipients,
            sent_recipients: row.sent_recipients,
            comment: row.comment,
            date_sent: row.date_sent,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deletion: SoftDelete {
                is_deleted: row.is_deleted,
                deleted_at: row.deleted_at,
                deleted_by: row.deleted_by.map(UserId::from_uuid),
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    delivery_id: Uuid,
    batch_index: i32,
    job_id: Uuid,
    recipients: Vec<String>,
    status: String,
    comment: Option<String>,
    attempted_at: DateTime<Utc>,
}

impl TryFrom<BatchRow> for DeliveryBatch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        Ok(DeliveryBatch {
            delivery_id: DeliveryId::from_uuid(row.delivery_id),
            batch_index: row.batch_index,
            job_id: row.job_id,
            recipients: row.recipients,
            status: row.status.parse::<BatchStatus>()?,
            comment: row.comment,
            attempted_at: row.attempted_at,
        })
    }
}
