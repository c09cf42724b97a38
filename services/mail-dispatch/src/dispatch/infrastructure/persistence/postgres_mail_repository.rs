use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailroom_common::{PagedResult, Pagination, SoftDelete, UserId};
use mailroom_errors::{AppError, AppResult};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::dispatch::domain::entities::{MailId, MailKind, MailRecord};
use crate::dispatch::domain::repositories::{MailFilter, MailRepository};

const COLUMNS: &str = "id, owner_id, kind, sender_address, sender_name, recipients, subject, \
                       created_at, is_deleted, deleted_at, deleted_by";

pub struct PostgresMailRepository {
    pool: PgPool,
}

impl PostgresMailRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MailRepository for PostgresMailRepository {
    async fn find_by_id(&self, id: &MailId) -> AppResult<Option<MailRecord>> {
        debug!("Finding mail by id: {}", id);

        let row = sqlx::query_as::<_, MailRow>(&format!(
            "SELECT {COLUMNS} FROM mail_records WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find mail: {}", e)))?;

        row.map(MailRecord::try_from).transpose()
    }

    async fn delete_by_id(&self, id: &MailId, deleted_by: UserId) -> AppResult<()> {
        debug!("Deleting mail: {}", id);

        let result = sqlx::query(
            r#"
            UPDATE mail_records
            SET is_deleted = TRUE, deleted_at = NOW(), deleted_by = $2
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id.0)
        .bind(deleted_by.0)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete mail: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Mail {} not found", id)));
        }
        Ok(())
    }

    async fn index(&self, filter: &MailFilter, pagination: &Pagination) -> AppResult<PagedResult<MailRecord>> {
        let kind = filter.kind.map(|k| k.as_str());

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM mail_records
            WHERE owner_id = $1 AND is_deleted = FALSE AND ($2::text IS NULL OR kind = $2)
            "#,
        )
        .bind(filter.owner_id.0)
        .bind(kind)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count mails: {}", e)))?;

        let rows = sqlx::query_as::<_, MailRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM mail_records
            WHERE owner_id = $1 AND is_deleted = FALSE AND ($2::text IS NULL OR kind = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.owner_id.0)
        .bind(kind)
        .bind(i64::from(pagination.page_size))
        .bind(i64::from(pagination.offset()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list mails: {}", e)))?;

        let items = rows
            .into_iter()
            .map(MailRecord::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(PagedResult::new(items, total.0.max(0) as u64, pagination))
    }
}

#[derive(sqlx::FromRow)]
struct MailRow {
    id: Uuid,
    owner_id: Uuid,
    kind: String,
    sender_address: String,
    sender_name: String,
    recipients: Vec<String>,
    subject: String,
    created_at: DateTime<Utc>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<Uuid>,
}

impl TryFrom<MailRow> for MailRecord {
    type Error = AppError;

    fn try_from(row: MailRow) -> Result<Self, Self::Error> {
        Ok(MailRecord {
            id: MailId::from_uuid(row.id),
            owner_id: UserId::from_uuid(row.owner_id),
            kind: row.kind.parse::<MailKind>()?,
            sender_address: row.sender_address,
            sender_name: row.sender_name,
            recipients: row.recipients,
            subject: row.subject,
            created_at: row.created_at,
            deletion: SoftDelete {
                is_deleted: row.is_deleted,
                deleted_at: row.deleted_at,
                deleted_by: row.deleted_by.map(UserId::from_uuid),
            },
        })
    }
}
