//! Email 适配器
//!
//! - 邮件服务商抽象：一次连接、多次发送、显式关闭
//! - 基于 lettre 的 SMTP 实现
//! - 基于 tera 的模板渲染

mod client;
mod template;

pub use client::SmtpMailTransport;
pub use template::TemplateEngine;

use async_trait::async_trait;
use mailroom_errors::AppResult;
use secrecy::Secret;

/// 待发送的邮件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from_name: String,
    pub from_address: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// 邮件服务商
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// 服务商标识，写入投递记录
    fn provider_name(&self) -> &str;

    /// 使用账户凭据建立连接（含认证）
    async fn connect(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> AppResult<Box<dyn MailConnection>>;
}

/// 已建立的服务商连接
#[async_trait]
pub trait MailConnection: Send {
    /// 通过当前连接发送一封邮件
    async fn send(&mut self, mail: &OutgoingMail) -> AppResult<()>;

    /// 关闭连接
    async fn close(self: Box<Self>);
}
