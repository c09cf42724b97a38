use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailroom_adapter_postgres::map_sqlx_error;
use mailroom_common::{PagedResult, Pagination, SoftDelete, UserId};
use mailroom_errors::{AppError, AppResult};
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::debug;
use uuid::Uuid;

use crate::template::domain::entities::{MailTemplate, Placeholder, TemplateId};
use crate::template::domain::repositories::{TemplateFilter, TemplateRepository};

const COLUMNS: &str = "id, owner_id, name, storage_reference, cache_id, placeholders, \
                       created_at, updated_at, is_deleted, deleted_at, deleted_by";

pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    async fn create(&self, template: &MailTemplate) -> AppResult<()> {
        debug!("Creating template: {}", template.id);

        sqlx::query(
            r#"
            INSERT INTO mail_templates (id, owner_id, name, storage_reference, cache_id,
                                        placeholders, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(template.id.0)
        .bind(template.owner_id.0)
        .bind(&template.name)
        .bind(&template.storage_reference)
        .bind(&template.cache_id)
        .bind(Json(&template.placeholders))
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "Failed to create template"))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &TemplateId) -> AppResult<Option<MailTemplate>> {
        debug!("Finding template by id: {}", id);

        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {COLUMNS} FROM mail_templates WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find template: {}", e)))?;

        Ok(row.map(|r| r.into()))
    }

    async fn find(&self, filter: &TemplateFilter) -> AppResult<Option<MailTemplate>> {
        debug!("Finding template by filter: {:?}", filter);

        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM mail_templates
            WHERE owner_id = $1 AND is_deleted = FALSE
              AND ($2::uuid IS NULL OR id = $2)
              AND ($3::text IS NULL OR name = $3)
            LIMIT 1
            "#
        ))
        .bind(filter.owner_id.0)
        .bind(filter.id.map(|id| id.0))
        .bind(filter.name.as_deref())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find template: {}", e)))?;

        Ok(row.map(|r| r.into()))
    }

    async fn update_by_id(&self, template: &MailTemplate) -> AppResult<()> {
        debug!("Updating template: {}", template.id);

        let result = sqlx::query(
            r#"
            UPDATE mail_templates
            SET name = $2, storage_reference = $3, cache_id = $4, placeholders = $5, updated_at = $6
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(template.id.0)
        .bind(&template.name)
        .bind(&template.storage_reference)
        .bind(&template.cache_id)
        .bind(Json(&template.placeholders))
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "Failed to update template"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Template {} not found", template.id)));
        }
        Ok(())
    }

    async fn set_cache_id(&self, id: &TemplateId, storage_reference: &str, cache_id: &str) -> AppResult<bool> {
        debug!("Recording cache id for template: {}", id);

        let result = sqlx::query(
            r#"
            UPDATE mail_templates
            SET cache_id = $2
            WHERE id = $1 AND storage_reference = $3 AND is_deleted = FALSE
            "#,
        )
        .bind(id.0)
        .bind(cache_id)
        .bind(storage_reference)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to record template cache id: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_id(&self, id: &TemplateId, deleted_by: UserId) -> AppResult<()> {
        debug!("Deleting template: {}", id);

        let result = sqlx::query(
            r#"
            UPDATE mail_templates
            SET is_deleted = TRUE, deleted_at = NOW(), deleted_by = $2
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id.0)
        .bind(deleted_by.0)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete template: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Template {} not found", id)));
        }
        Ok(())
    }

    async fn index(&self, owner_id: &UserId, pagination: &Pagination) -> AppResult<PagedResult<MailTemplate>> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM mail_templates WHERE owner_id = $1 AND is_deleted = FALSE",
        )
        .bind(owner_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count templates: {}", e)))?;

        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM mail_templates
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
        .map_err(|e| AppError::database(format!("Failed to list templates: {}", e)))?;

        let items = rows.into_iter().map(|r| r.into()).collect();
        Ok(PagedResult::new(items, total.0.max(0) as u64, pagination))
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    storage_reference: Option<String>,
    cache_id: Option<String>,
    placeholders: Json<Vec<Placeholder>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<Uuid>,
}

impl From<TemplateRow> for MailTemplate {
    fn from(row: TemplateRow) -> Self {
        MailTemplate {
            id: TemplateId::from_uuid(row.id),
            owner_id: UserId::from_uuid(row.owner_id),
            name: row.name,
            storage_reference: row.storage_reference,
            cache_id: row.cache_id,
            placeholders: row.placeholders.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deletion: SoftDelete {
                is_deleted: row.is_deleted,
                deleted_at: row.deleted_at,
                deleted_by: row.deleted_by.map(UserId::from_uuid),
            },
        }
    }
}
