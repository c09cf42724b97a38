//! 发件箱
//!
//! 校验发送请求、解析发件账户，并在一个事务中写入邮件记录和投递记录

use std::sync::Arc;

use email_address::EmailAddress;
use mailroom_common::UserId;
use mailroom_errors::{AppError, AppResult};
use tracing::info;

use crate::account::domain::entities::Account;
use crate::account::domain::repositories::{AccountFilter, AccountRepository};
use crate::dispatch::domain::entities::{DeliveryRecord, MailKind, MailRecord};
use crate::dispatch::domain::repositories::MailOutboxStore;

/// 发送请求
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub kind: MailKind,
    pub sender_address: String,
    pub sender_name: Option<String>,
    pub recipients: Vec<String>,
    pub subject: String,
}

impl SendRequest {
    /// 校验请求，返回去空白、去重后的收件人
    pub fn validate(&self) -> AppResult<Vec<String>> {
        if self.subject.trim().is_empty() {
            return Err(AppError::validation("Subject must not be empty"));
        }

        let mut recipients: Vec<String> = Vec::with_capacity(self.recipients.len());
        for recipient in &self.recipients {
            let recipient = recipient.trim();
            if !EmailAddress::is_valid(recipient) {
                return Err(AppError::validation(format!("Invalid recipient address: {}", recipient)));
            }
            if !recipients.iter().any(|r| r.eq_ignore_ascii_case(recipient)) {
                recipients.push(recipient.to_string());
            }
        }

        match (self.kind, recipients.len()) {
            (_, 0) => Err(AppError::validation("At least one recipient is required")),
            (MailKind::Single, n) if n > 1 => {
                Err(AppError::validation("Single mail must have exactly one recipient"))
            }
            _ => Ok(recipients),
        }
    }
}

/// 已落库的发送请求
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub mail: MailRecord,
    pub delivery: DeliveryRecord,
    pub account: Account,
}

pub struct DispatchOutbox {
    accounts: Arc<dyn AccountRepository>,
    store: Arc<dyn MailOutboxStore>,
}

impl DispatchOutbox {
    pub fn new(accounts: Arc<dyn AccountRepository>, store: Arc<dyn MailOutboxStore>) -> Self {
        Self { accounts, store }
    }

    /// 校验并落库，账户不存在或校验失败时不写入任何记录
    pub async fn create_send_request(&self, owner_id: UserId, request: SendRequest) -> AppResult<OutboxEntry> {
        let recipients = request.validate()?;

        let sender_address = request.sender_address.trim();
        let account = self
            .accounts
            .find(&AccountFilter::by_address(owner_id, sender_address))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Sender account {} not found", sender_address)))?;

        let sender_name = request
            .sender_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&account.display_name)
            .to_string();

        let mail = MailRecord::new(
            owner_id,
            request.kind,
            account.address.clone(),
            sender_name,
            recipients,
            request.subject.trim(),
        );
        let delivery = DeliveryRecord::pending(owner_id, mail.mail_ref());

        self.store.create(&mail, &delivery).await?;

        info!(
            mail_id = %mail.id,
            delivery_id = %delivery.id,
            kind = %mail.kind,
            recipients = mail.recipients.len(),
            "Send request recorded"
        );

        Ok(OutboxEntry {
            mail,
            delivery,
            account,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(kind: MailKind, recipients: &[&str]) -> SendRequest {
        SendRequest {
            kind,
            sender_address: "ops@example.com".into(),
            sender_name: None,
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            subject: "Hello".into(),
        }
    }

    #[test]
    fn test_validate_dedupes_recipients() {
        let recipients = request(MailKind::Bulk, &["a@example.com", " A@example.com ", "b@example.com"])
            .validate()
            .unwrap();
        assert_eq!(recipients, vec!["a@example.com", "b@example.com"]);
    }

    #[test]
    fn test_validate_rejects_invalid_address() {
        let err = request(MailKind::Bulk, &["a@example.com", "not-an-address"]).validate().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validate_rejects_empty_recipients() {
        assert!(request(MailKind::Bulk, &[]).validate().is_err());
    }

    #[test]
    fn test_single_requires_one_recipient() {
        assert!(request(MailKind::Single, &["a@example.com"]).validate().is_ok());
        assert!(request(MailKind::Single, &["a@example.com", "b@example.com"]).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_subject() {
        let mut req = request(MailKind::Single, &["a@example.com"]);
        req.subject = "  ".into();
        assert!(req.validate().is_err());
    }
}
