//! 邮件发送模块
//!
//! 请求侧：校验、发件箱落库、投递任务；
//! 执行侧：Worker 消费任务，按批发送并回写投递状态

pub mod application;
pub mod domain;
pub mod infrastructure;
