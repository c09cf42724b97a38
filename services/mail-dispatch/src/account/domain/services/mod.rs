//! 账户领域服务

pub mod credential_vault;

pub use credential_vault::CredentialVault;
