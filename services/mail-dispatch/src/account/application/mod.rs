pub mod account_service;
pub mod commands;

pub use account_service::AccountService;
pub use commands::{RegisterAccountCommand, UpdateAccountCommand};
