use chrono::{DateTime, Utc};
use mailroom_common::{SoftDelete, UserId};
use mailroom_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 邮件 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MailId(pub Uuid);

impl MailId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MailId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 邮件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailKind {
    /// 单个收件人
    Single,
    /// 多个收件人
    Bulk,
}

impl MailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Bulk => "bulk",
        }
    }
}

impl std::fmt::Display for MailKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MailKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "bulk" => Ok(Self::Bulk),
            other => Err(AppError::internal(format!("Unknown mail kind: {}", other))),
        }
    }
}

/// 投递记录指向的邮件，单发和群发二选一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailRef {
    Single(MailId),
    Bulk(MailId),
}

impl MailRef {
    pub fn new(kind: MailKind, id: MailId) -> Self {
        match kind {
            MailKind::Single => Self::Single(id),
            MailKind::Bulk => Self::Bulk(id),
        }
    }

    pub fn mail_id(&self) -> MailId {
        match self {
            Self::Single(id) | Self::Bulk(id) => *id,
        }
    }

    pub fn kind(&self) -> MailKind {
        match self {
            Self::Single(_) => MailKind::Single,
            Self::Bulk(_) => MailKind::Bulk,
        }
    }
}

/// 邮件记录，创建后内容不再变化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailRecord {
    pub id: MailId,
    pub owner_id: UserId,
    pub kind: MailKind,
    pub sender_address: String,
    pub sender_name: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub deletion: SoftDelete,
}

impl MailRecord {
    pub fn new(
        owner_id: UserId,
        kind: MailKind,
        sender_address: impl Into<String>,
        sender_name: impl Into<String>,
        recipients: Vec<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            id: MailId::new(),
            owner_id,
            kind,
            sender_address: sender_address.into(),
            sender_name: sender_name.into(),
            recipients,
            subject: subject.into(),
            created_at: Utc::now(),
            deletion: SoftDelete::default(),
        }
    }

    pub fn mail_ref(&self) -> MailRef {
        MailRef::new(self.kind, self.id)
    }

    pub fn ensure_kind(&self, kind: MailKind) -> AppResult<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(AppError::not_found(format!("{} mail {} not found", kind, self.id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mail_ref_follows_kind() {
        let mail = MailRecord::new(
            UserId::new(),
            MailKind::Bulk,
            "ops@example.com",
            "Ops",
            vec!["a@example.com".into()],
            "Hi",
        );
        assert_eq!(mail.mail_ref(), MailRef::Bulk(mail.id));
        assert_eq!(mail.mail_ref().mail_id(), mail.id);
        assert_eq!(mail.mail_ref().kind(), MailKind::Bulk);
    }

    #[test]
    fn test_kind_roundtrip() {
        for kind in [MailKind::Single, MailKind::Bulk] {
            assert_eq!(kind.as_str().parse::<MailKind>().unwrap(), kind);
        }
        assert!("other".parse::<MailKind>().is_err());
    }
}
