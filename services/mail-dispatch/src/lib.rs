//! Mail Dispatch Service Library
//!
//! 模块化架构：
//! - `account`: 发件账户（凭据加密存储）
//! - `template`: 邮件模板（上传、占位符、渲染与脱敏）
//! - `dispatch`: 发送流程（发件箱、任务投递、分批发送、投递对账、事件消费）

pub mod account;
pub mod dispatch;
pub mod error;
pub mod template;
