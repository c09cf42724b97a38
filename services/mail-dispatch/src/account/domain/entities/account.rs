use chrono::{DateTime, Utc};
use mailroom_common::{SoftDelete, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 账户 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 发件账户
///
/// 密码只以密文保存，密钥由地址派生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// 账户 ID
    pub id: AccountId,
    /// 所有者
    pub owner_id: UserId,
    /// 发件地址，同时是 SMTP 用户名
    pub address: String,
    /// 默认发件人名称
    pub display_name: String,
    /// 加密后的密码
    #[serde(skip_serializing)]
    pub encrypted_password: String,
    /// 是否为默认账户
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deletion: SoftDelete,
}

impl Account {
    pub fn new(
        owner_id: UserId,
        address: impl Into<String>,
        display_name: impl Into<String>,
        encrypted_password: String,
        is_default: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            owner_id,
            address: address.into(),
            display_name: display_name.into(),
            encrypted_password,
            is_default,
            created_at: now,
            updated_at: now,
            deletion: SoftDelete::default(),
        }
    }

    /// 地址比较忽略大小写
    pub fn owns_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }

    pub fn is_active(&self) -> bool {
        !self.deletion.is_deleted
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
