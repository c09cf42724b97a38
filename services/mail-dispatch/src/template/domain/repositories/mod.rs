//! 模板仓储接口

pub mod template_repository;

pub use template_repository::{TemplateFilter, TemplateRepository};
