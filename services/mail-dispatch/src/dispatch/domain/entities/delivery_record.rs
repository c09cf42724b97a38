use chrono::{DateTime, Utc};
use mailroom_common::{SoftDelete, UserId};
use mailroom_errors::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MailRef;

/// 投递记录 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeliveryId(pub Uuid);

impl DeliveryId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 投递状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    NotSentToProvider,
    SentToProvider,
    PartiallySentToProvider,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSentToProvider => "not_sent_to_provider",
            Self::SentToProvider => "sent_to_provider",
            Self::PartiallySentToProvider => "partially_sent_to_provider",
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_sent_to_provider" => Ok(Self::NotSentToProvider),
            "sent_to_provider" => Ok(Self::SentToProvider),
            "partially_sent_to_provider" => Ok(Self::PartiallySentToProvider),
            other => Err(AppError::internal(format!("Unknown delivery status: {}", other))),
        }
    }
}

/// 单个批次的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Sent,
    NotSent,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::NotSent => "not_sent",
        }
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "not_sent" => Ok(Self::NotSent),
            other => Err(AppError::internal(format!("Unknown batch status: {}", other))),
        }
    }
}

/// 批次发送结果，以 (delivery_id, batch_index) 唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryBatch {
    pub delivery_id: DeliveryId,
    pub batch_index: i32,
    /// 产生该结果的任务，重投时据此跳过已发送批次
    pub job_id: Uuid,
    pub recipients: Vec<String>,
    pub status: BatchStatus,
    pub comment: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl DeliveryBatch {
    pub fn sent(delivery_id: DeliveryId, batch_index: i32, job_id: Uuid, recipients: Vec<String>) -> Self {
        Self {
            delivery_id,
            batch_index,
            job_id,
            recipients,
            status: BatchStatus::Sent,
            comment: None,
            attempted_at: Utc::now(),
        }
    }

    pub fn failed(
        delivery_id: DeliveryId,
        batch_index: i32,
        job_id: Uuid,
        recipients: Vec<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            delivery_id,
            batch_index,
            job_id,
            recipients,
            status: BatchStatus::NotSent,
            comment: Some(comment.into()),
            attempted_at: Utc::now(),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == BatchStatus::Sent
    }
}

/// 投递记录，只由对账器写入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: DeliveryId,
    pub owner_id: UserId,
    pub mail: MailRef,
    pub provider_name: Option<String>,
    pub status: DeliveryStatus,
    /// 尝试发送的收件人数
    pub total_recipients: i32,
    /// 服务商接收的收件人数
    pub sent_recipients: i32,
    pub comment: Option<String>,
    pub date_sent: Option<DateTime<Utc>>,
    /// 乐观锁版本
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deletion: SoftDelete,
}

impl DeliveryRecord {
    /// 与邮件记录同时创建的待发送记录
    pub fn pending(owner_id: UserId, mail: MailRef) -> Self {
        let now = Utc::now();
        Self {
            id: DeliveryId::new(),
            owner_id,
            mail,
            provider_name: None,
            status: DeliveryStatus::NotSentToProvider,
            total_recipients: 0,
            sent_recipients: 0,
            comment: None,
            date_sent: None,
            version: 0,
            created_at: now,
            updated_at: now,
            deletion: SoftDelete::default(),
        }
    }

    /// 由全部批次结果重新计算汇总
    pub fn apply_batches(&mut self, provider_name: &str, batches: &[DeliveryBatch]) {
        let attempted: usize = batches.iter().map(|b| b.recipients.len()).sum();
        let accepted: usize = batches.iter().filter(|b| b.is_sent()).map(|b| b.recipients.len()).sum();
        let sent_batches = batches.iter().filter(|b| b.is_sent()).count();

        self.status = if sent_batches == 0 {
            DeliveryStatus::NotSentToProvider
        } else if sent_batches == batches.len() {
            DeliveryStatus::SentToProvider
        } else {
            DeliveryStatus::PartiallySentToProvider
        };

        let comments: Vec<String> = batches
            .iter()
            .filter_map(|b| b.comment.as_ref().map(|c| format!("batch {}: {}", b.batch_index, c)))
            .collect();

        self.provider_name = Some(provider_name.to_string());
        self.total_recipients = count(attempted);
        self.sent_recipients = count(accepted);
        self.comment = (!comments.is_empty()).then(|| comments.join("; "));
        self.date_sent = batches.iter().filter(|b| b.is_sent()).map(|b| b.attempted_at).max();
        self.updated_at = Utc::now();
    }

    /// 整体失败（连接、凭据等），没有任何收件人被接收
    pub fn record_failure(&mut self, provider_name: &str, recipients: usize, comment: &str) {
        self.provider_name = Some(provider_name.to_string());
        self.status = DeliveryStatus::NotSentToProvider;
        self.total_recipients = count(recipients);
        self.sent_recipients = 0;
        self.comment = Some(comment.to_string());
        self.updated_at = Utc::now();
    }
}

fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
