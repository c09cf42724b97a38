//! 发送仓储接口

pub mod delivery_repository;
pub mod mail_outbox_store;
pub mod mail_repository;

pub use delivery_repository::{DeliveryFilter, DeliveryRepository};
pub use mail_outbox_store::MailOutboxStore;
pub use mail_repository::{MailFilter, MailRepository};
