use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailroom_adapter_postgres::map_sqlx_error;
use mailroom_common::{PagedResult, Pagination, SoftDelete, UserId};
use mailroom_errors::{AppError, AppResult};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::account::domain::entities::{Account, AccountId};
use crate::account::domain::repositories::{AccountFilter, AccountRepository};

const COLUMNS: &str = "id, owner_id, address, display_name, encrypted_password, is_default, \
                       created_at, updated_at, is_deleted, deleted_at, deleted_by";

pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn create(&self, account: &Account) -> AppResult<()> {
        debug!("Creating account: {}", account.id);

        sqlx::query(
            r#"
            INSERT INTO mail_accounts (id, owner_id, address, display_name, encrypted_password,
                                       is_default, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.id.0)
        .bind(account.owner_id.0)
        .bind(&account.address)
        .bind(&account.display_name)
        .bind(&account.encrypted_password)
        .bind(account.is_default)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(e, "Failed to create account"))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &AccountId) -> AppResult<Option<Account>> {
        debug!("Finding account by id: {}", id);

        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {COLUMNS} FROM mail_accounts WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find account: {}", e)))?;

        Ok(row.map(|r| r.into()))
    }

    async fn find(&self, filter: &AccountFilter) -> AppResult<Option<Account>> {
        debug!("Finding account by filter: {:?}", filter);

        let row = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM mail_accounts
            WHERE is_deleted = FALSE
              AND ($1::uuid IS NULL OR owner_id = $1)
              AND ($2::text IS NULL OR lower(address) = lower($2))
              AND ($3::boolean IS NULL OR is_default = $3)
            ORDER BY created_at
            LIMIT 1
            "#
        ))
        .bind(filter.owner_id.map(|id| id.0))
        .bind(filter.address.as_deref())
        .bind(filter.is_default)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to find account: {}", e)))?;

        Ok(row.map(|r| r.into()))
    }

    async fn update_by_id(&self, account: &Account) -> AppResult<()> {
        debug!("Updating account: {}", account.id);

        let result = sqlx::query(
            r#"
            UPDATE mail_accounts
            SET display_name = $2, encrypted_password = $3, is_default = $4, updated_at = $5
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(account.id.0)
        .bind(&account.display_name)
        .bind(&account.encrypted_password)
        .bind(account.is_default)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update account: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Account {} not found", account.id)));
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: &AccountId, deleted_by: UserId) -> AppResult<()> {
        debug!("Deleting account: {}", id);

        let result = sqlx::query(
            r#"
            UPDATE mail_accounts
            SET is_deleted = TRUE, deleted_at = NOW(), deleted_by = $2
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id.0)
        .bind(deleted_by.0)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete account: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Account {} not found", id)));
        }
        Ok(())
    }

    async fn index(&self, owner_id: &UserId, pagination: &Pagination) -> AppResult<PagedResult<Account>> {
        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM mail_accounts WHERE owner_id = $1 AND is_deleted = FALSE",
        )
        .bind(owner_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to count accounts: {}", e)))?;

        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            r#"
            SELECT {COLUMNS}
            FROM mail_accounts
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
        .map_err(|e| AppError::database(format!("Failed to list accounts: {}", e)))?;

        let items = rows.into_iter().map(|r| r.into()).collect();
        Ok(PagedResult::new(items, total.0.max(0) as u64, pagination))
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    owner_id: Uuid,
    address: String,
    display_name: String,
    encrypted_password: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    is_deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    deleted_by: Option<Uuid>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Account {
            id: AccountId::from_uuid(row.id),
            owner_id: UserId::from_uuid(row.owner_id),
            address: row.address,
            display_name: row.display_name,
            encrypted_password: row.encrypted_password,
            is_default: row.is_default,
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
