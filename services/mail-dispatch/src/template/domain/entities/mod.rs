//! 模板实体

pub mod mail_template;
pub mod placeholder;

pub use mail_template::{MailTemplate, TemplateId};
pub use placeholder::Placeholder;
