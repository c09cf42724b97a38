//! PostgreSQL 连接管理

use std::path::Path;
use std::time::Duration;

use mailroom_config::DatabaseConfig;
use mailroom_errors::{AppError, AppResult};
use secrecy::ExposeSecret;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// 唯一约束冲突
const UNIQUE_VIOLATION: &str = "23505";
/// 外键约束失败
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL 连接池配置
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl From<&DatabaseConfig> for PostgresConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.expose_secret().clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            ..Default::default()
        }
    }
}

/// 创建 PostgreSQL 连接池
pub async fn create_pool(config: &PostgresConfig) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(&config.url)
        .await
        .map_err(|e| AppError::database(format!("Failed to create pool: {}", e)))
}

/// 检查数据库连接
pub async fn check_connection(pool: &PgPool) -> AppResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| AppError::database(format!("Database health check failed: {}", e)))?;
    Ok(())
}

/// 执行目录中的迁移脚本
pub async fn run_migrations(pool: &PgPool, dir: impl AsRef<Path>) -> AppResult<()> {
    let dir = dir.as_ref();
    let migrator = Migrator::new(dir)
        .await
        .map_err(|e| AppError::database(format!("Failed to load migrations from {}: {}", dir.display(), e)))?;

    migrator
        .run(pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to run migrations: {}", e)))?;

    info!(dir = %dir.display(), "Database migrations applied");
    Ok(())
}

/// 转换 sqlx 错误
///
/// 唯一约束冲突映射为 Conflict，外键失败映射为 NotFound
pub fn map_sqlx_error(err: sqlx::Error, context: &str) -> AppError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned());

    match code.as_deref() {
        Some(UNIQUE_VIOLATION) => AppError::conflict(format!("{}: already exists", context)),
        Some(FOREIGN_KEY_VIOLATION) => {
            AppError::not_found(format!("{}: referenced row is missing", context))
        }
        _ => AppError::database(format!("{}: {}", context, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_error_maps_to_database() {
        let err = map_sqlx_error(sqlx::Error::RowNotFound, "Failed to load account");
        assert!(matches!(err, AppError::Database(_)));
        assert!(err.to_string().contains("Failed to load account"));
    }
}
