//! 账户实体

pub mod account;

pub use account::{Account, AccountId};
