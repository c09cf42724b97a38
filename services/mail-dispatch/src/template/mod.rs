//! 邮件模板模块
//!
//! 负责模板上传、占位符定义、渲染与敏感值脱敏

pub mod application;
pub mod domain;
pub mod infrastructure;
