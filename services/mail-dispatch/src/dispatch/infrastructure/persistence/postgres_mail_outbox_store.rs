use async_trait::async_trait;
use mailroom_adapter_postgres::{TransactionManager, map_sqlx_error};
use mailroom_errors::AppResult;
use tracing::debug;

use crate::dispatch::domain::entities::{DeliveryRecord, MailRecord};
use crate::dispatch::domain::repositories::MailOutboxStore;

pub struct PostgresMailOutboxStore {
    tx_manager: TransactionManager,
}

impl PostgresMailOutboxStore {
    pub fn new(tx_manager: TransactionManager) -> Self {
        Self { tx_manager }
    }
}

#[async_trait]
impl MailOutboxStore for PostgresMailOutboxStore {
    async fn create(&self, mail: &MailRecord, delivery: &DeliveryRecord) -> AppResult<()> {
        debug!("Recording mail {} with delivery {}", mail.id, delivery.id);

        let mut tx = self.tx_manager.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO mail_records (id, owner_id, kind, sender_address, sender_name,
                                      recipients, subject, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(mail.id.0)
        .bind(mail.owner_id.0)
        .bind(mail.kind.as_str())
        .bind(&mail.sender_address)
        .bind(&mail.sender_name)
        .bind(&mail.recipients)
        .bind(&mail.subject)
        .bind(mail.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(e, "Failed to insert mail record"))?;

        sqlx::query(
            r#"
            INSERT INTO mail_deliveries (id, owner_id, mail_id, mail_kind, provider_name, status,
                                         total_recipients, sent_recipients, comment, date_sent,
                                         version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(delivery.id.0)
        .bind(delivery.owner_id.0)
        .bind(delivery.mail.mail_id().0)
        .bind(delivery.mail.kind().as_str())
        .bind(&delivery.provider_name)
        .bind(delivery.status.as_str())
        .bind(delivery.total_recipients)
        .bind(delivery.sent_recipients)
        .bind(&delivery.comment)
        .bind(delivery.date_sent)
        .bind(delivery.version)
        .bind(delivery.created_at)
        .bind(delivery.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error(e, "Failed to insert delivery record"))?;

        TransactionManager::commit(tx).await
    }
}
