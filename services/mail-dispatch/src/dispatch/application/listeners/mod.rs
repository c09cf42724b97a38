//! 事件监听器

pub mod bulk_mail_listener;

pub use bulk_mail_listener::{BulkMailEvent, BulkMailEventListener};
