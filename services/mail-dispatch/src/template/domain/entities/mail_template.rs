use chrono::{DateTime, Utc};
use mailroom_common::{SoftDelete, UserId};
use mailroom_errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Placeholder;

/// 模板 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub Uuid);

impl TemplateId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TemplateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 邮件模板
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailTemplate {
    pub id: TemplateId,
    pub owner_id: UserId,
    /// 同一所有者下唯一
    pub name: String,
    /// 远端存储中的对象 key
    pub storage_reference: Option<String>,
    /// 本地缓存中的对象 key，内容变更后清空
    pub cache_id: Option<String>,
    pub placeholders: Vec<Placeholder>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deletion: SoftDelete,
}

impl MailTemplate {
    pub fn new(owner_id: UserId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TemplateId::new(),
            owner_id,
            name: name.into(),
            storage_reference: None,
            cache_id: None,
            placeholders: Vec::new(),
            created_at: now,
            updated_at: now,
            deletion: SoftDelete::default(),
        }
    }

    /// 替换占位符定义，key 必须合法且不重复
    pub fn set_placeholders(&mut self, placeholders: Vec<Placeholder>) -> AppResult<()> {
        for (index, placeholder) in placeholders.iter().enumerate() {
            placeholder.validate()?;
            if placeholders[..index].iter().any(|p| p.key == placeholder.key) {
                return Err(AppError::validation(format!(
                    "Duplicate placeholder key '{}'",
                    placeholder.key
                )));
            }
        }

        self.placeholders = placeholders;
        self.touch();
        Ok(())
    }

    /// 绑定新的模板内容，旧缓存失效
    pub fn replace_content(&mut self, storage_reference: String) {
        self.storage_reference = Some(storage_reference);
        self.cache_id = None;
        self.touch();
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.placeholders.iter().any(|p| p.is_sensitive && p.key == key)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
