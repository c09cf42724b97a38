//! 发件账户模块
//!
//! 负责账户登记、凭据加密和账户 CRUD

pub mod application;
pub mod domain;
pub mod infrastructure;
