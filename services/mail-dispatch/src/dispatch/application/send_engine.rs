//! 分批发送
//!
//! 每个任务解析一次凭据、建立一次服务商连接，再按批次发送。
//! 单个批次失败不影响后续批次；连接在所有批次结束后关闭。

use std::sync::Arc;

use mailroom_adapter_email::{MailConnection, MailTransport, OutgoingMail};
use mailroom_errors::{AppError, AppResult};
use mailroom_telemetry::{MAIL_BATCHES_TOTAL, MAIL_JOBS_TOTAL};
use secrecy::Secret;
use tracing::{error, info, warn};

use crate::account::domain::repositories::AccountRepository;
use crate::account::domain::services::CredentialVault;
use crate::dispatch::application::reconciler::DeliveryReconciler;
use crate::dispatch::domain::entities::{DeliveryBatch, SendMailJob};

/// 默认每批收件人数
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// 任务终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// 全部批次被接收
    Sent,
    /// 部分批次失败
    PartiallyFailed,
    /// 没有任何收件人被接收
    Failed,
}

impl SendOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::PartiallyFailed => "partially_failed",
            Self::Failed => "failed",
        }
    }
}

pub struct BatchedSendEngine {
    accounts: Arc<dyn AccountRepository>,
    vault: Arc<CredentialVault>,
    transport: Arc<dyn MailTransport>,
    reconciler: DeliveryReconciler,
    batch_size: usize,
}

impl BatchedSendEngine {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        vault: Arc<CredentialVault>,
        transport: Arc<dyn MailTransport>,
        reconciler: DeliveryReconciler,
    ) -> Self {
        Self {
            accounts,
            vault,
            transport,
            reconciler,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// 执行发送任务，结果写入投递记录
    pub async fn run(&self, job: &SendMailJob) -> SendOutcome {
        let outcome = self.execute(job).await;
        metrics::counter!(MAIL_JOBS_TOTAL, "outcome" => outcome.as_str()).increment(1);

        info!(
            job_id = %job.job_id,
            delivery_id = %job.mail_record.delivery_id,
            outcome = outcome.as_str(),
            "Send job finished"
        );
        outcome
    }

    async fn execute(&self, job: &SendMailJob) -> SendOutcome {
        let attr = &job.mail_attr;
        let delivery_id = job.mail_record.delivery_id;

        if attr.recipients.is_empty() {
            error!(job_id = %job.job_id, %delivery_id, "Send job has no recipients");
            self.reconciler.record_failure(delivery_id, 0, "no recipients").await;
            return SendOutcome::Failed;
        }

        let mut connection = match self.connect(job).await {
            Ok(connection) => connection,
            Err(e) => {
                error!(job_id = %job.job_id, %delivery_id, error = %e, "Failed to open provider connection");
                self.reconciler
                    .record_failure(delivery_id, attr.recipients.len(), &e.to_string())
                    .await;
                return SendOutcome::Failed;
            }
        };

        let mut sent = 0usize;
        let mut failed = 0usize;

        for (index, chunk) in attr.recipients.chunks(self.batch_size).enumerate() {
            let batch_index = i32::try_from(index).unwrap_or(i32::MAX);

            if self.reconciler.is_batch_sent(delivery_id, batch_index, job.job_id).await {
                info!(job_id = %job.job_id, %delivery_id, batch_index, "Batch already sent, skipping");
                sent += 1;
                continue;
            }

            let mail = OutgoingMail {
                from_name: attr.sender_name.clone(),
                from_address: attr.sender_address.clone(),
                to: chunk.to_vec(),
                subject: attr.subject.clone(),
                text_body: attr.text_body.clone().unwrap_or_default(),
                html_body: Some(attr.html_body.clone()),
            };

            let batch = match connection.send(&mail).await {
                Ok(()) => {
                    sent += 1;
                    DeliveryBatch::sent(delivery_id, batch_index, job.job_id, mail.to)
                }
                Err(e) => {
                    failed += 1;
                    warn!(job_id = %job.job_id, %delivery_id, batch_index, error = %e, "Batch rejected by provider");
                    DeliveryBatch::failed(delivery_id, batch_index, job.job_id, mail.to, e.to_string())
                }
            };

            metrics::counter!(MAIL_BATCHES_TOTAL, "status" => batch.status.as_str()).increment(1);
            self.reconciler.record_batch(batch).await;
        }

        connection.close().await;

        match (sent, failed) {
            (_, 0) => SendOutcome::Sent,
            (0, _) => SendOutcome::Failed,
            _ => SendOutcome::PartiallyFailed,
        }
    }

    /// 重新解析账户凭据并建立连接
    async fn connect(&self, job: &SendMailJob) -> AppResult<Box<dyn MailConnection>> {
        let attr = &job.mail_attr;
        let password = self.credentials(job).await?;
        self.transport.connect(&attr.sender_address, &password).await
    }

    async fn credentials(&self, job: &SendMailJob) -> AppResult<Secret<String>> {
        let attr = &job.mail_attr;
        let account = self
            .accounts
            .find_by_id(&attr.account_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Sender account {} not found", attr.account_id)))?;

        if !account.owns_address(&attr.sender_address) {
            return Err(AppError::validation(format!(
                "Sender {} does not match account {}",
                attr.sender_address, account.id
            )));
        }

        self.vault.decrypt(&account.address, &account.encrypted_password)
    }
}
