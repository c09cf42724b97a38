pub mod persistence;
pub mod worker;

pub use worker::{MailWorker, MailWorkerConfig};
