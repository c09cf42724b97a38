//! 发送实体

pub mod delivery_record;
pub mod mail_record;
pub mod send_job;

pub use delivery_record::{BatchStatus, DeliveryBatch, DeliveryId, DeliveryRecord, DeliveryStatus};
pub use mail_record::{MailId, MailKind, MailRecord, MailRef};
pub use send_job::{MailAttributes, MailRecordRef, SendMailJob};
