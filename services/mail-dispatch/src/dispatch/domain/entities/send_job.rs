//! 发送任务载荷
//!
//! 以 JSON 写入任务队列。载荷不含密码，Worker 按账户 ID 重新解析凭据。

use mailroom_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DeliveryId, MailId, MailRef};
use crate::account::domain::entities::AccountId;

/// 邮件内容与发件信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailAttributes {
    pub account_id: AccountId,
    pub sender_address: String,
    pub sender_name: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    #[serde(default)]
    pub text_body: Option<String>,
}

/// 任务关联的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRecordRef {
    pub delivery_id: DeliveryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_mail_id: Option<MailId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_mail_id: Option<MailId>,
}

impl MailRecordRef {
    pub fn new(delivery_id: DeliveryId, mail: MailRef) -> Self {
        let (single_mail_id, bulk_mail_id) = match mail {
            MailRef::Single(id) => (Some(id), None),
            MailRef::Bulk(id) => (None, Some(id)),
        };
        Self {
            delivery_id,
            single_mail_id,
            bulk_mail_id,
        }
    }

    /// 单发与群发 ID 必须恰好有一个
    pub fn mail(&self) -> AppResult<MailRef> {
        match (self.single_mail_id, self.bulk_mail_id) {
            (Some(id), None) => Ok(MailRef::Single(id)),
            (None, Some(id)) => Ok(MailRef::Bulk(id)),
            _ => Err(AppError::validation(
                "Exactly one of single_mail_id and bulk_mail_id must be set",
            )),
        }
    }
}

/// 发送任务
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMailJob {
    /// 每次投递唯一
    pub job_id: Uuid,
    pub mail_attr: MailAttributes,
    pub mail_record: MailRecordRef,
}

impl SendMailJob {
    pub fn new(mail_attr: MailAttributes, mail_record: MailRecordRef) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            mail_attr,
            mail_record,
        }
    }

    pub fn to_payload(&self) -> AppResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AppError::internal(format!("Failed to serialize send job: {}", e)))
    }

    pub fn from_payload(payload: &str) -> AppResult<Self> {
        let job: Self = serde_json::from_str(payload)?;
        job.mail_record.mail()?;
        if job.mail_attr.recipients.is_empty() {
            return Err(AppError::validation("Send job has no recipients"));
        }
        Ok(job)
    }
}
