//! 账户命令

use secrecy::Secret;
use serde::Deserialize;

/// 登记发件账户
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAccountCommand {
    pub address: String,
    pub display_name: String,
    pub password: Secret<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// 更新账户，未提供的字段保持不变
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAccountCommand {
    pub display_name: Option<String>,
    pub password: Option<Secret<String>>,
    pub is_default: Option<bool>,
}
