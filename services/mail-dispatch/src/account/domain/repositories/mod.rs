//! 账户仓储接口

pub mod account_repository;

pub use account_repository::{AccountFilter, AccountRepository};
