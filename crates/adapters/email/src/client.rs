//! SMTP 服务商实现

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart, header};
use lettre::transport::smtp::PoolConfig;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use mailroom_config::SmtpConfig;
use mailroom_errors::{AppError, AppResult};
use secrecy::{ExposeSecret, Secret};
use tracing::{debug, info};

use crate::{MailConnection, MailTransport, OutgoingMail};

/// SMTP 服务商
pub struct SmtpMailTransport {
    config: SmtpConfig,
}

impl SmtpMailTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// 构建 SMTP 传输，连接池只保留一条连接
    fn build_transport(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> AppResult<AsyncSmtpTransport<Tokio1Executor>> {
        let credentials =
            Credentials::new(username.to_string(), password.expose_secret().clone());

        let builder = if self.config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host).map_err(|e| {
                AppError::external_service(format!("Failed to create SMTP transport: {}", e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };

        Ok(builder
            .port(self.config.port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .pool_config(PoolConfig::new().min_idle(0).max_size(1))
            .build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    async fn connect(
        &self,
        username: &str,
        password: &Secret<String>,
    ) -> AppResult<Box<dyn MailConnection>> {
        let transport = self.build_transport(username, password)?;

        // 建立连接并完成认证，连接随后留在池中复用
        let connected = transport.test_connection().await.map_err(|e| {
            AppError::external_service(format!("SMTP connection to {} failed: {}", self.config.host, e))
        })?;
        if !connected {
            return Err(AppError::external_service(format!(
                "SMTP server {} did not accept the connection",
                self.config.host
            )));
        }

        info!(host = %self.config.host, username = %username, "SMTP connection established");
        Ok(Box::new(SmtpConnection {
            transport,
            host: self.config.host.clone(),
        }))
    }
}

/// 一次任务内复用的 SMTP 连接
struct SmtpConnection {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

#[async_trait]
impl MailConnection for SmtpConnection {
    async fn send(&mut self, mail: &OutgoingMail) -> AppResult<()> {
        let message = build_message(mail)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::provider_send(e.to_string()))?;

        debug!(recipients = mail.to.len(), subject = %mail.subject, "Mail accepted by provider");
        Ok(())
    }

    async fn close(self: Box<Self>) {
        // 丢弃传输即释放池中的连接
        drop(self.transport);
        debug!(host = %self.host, "SMTP connection closed");
    }
}

fn parse_address(address: &str) -> AppResult<Address> {
    address
        .parse()
        .map_err(|e| AppError::validation(format!("Invalid address {}: {}", address, e)))
}

/// 构建邮件消息：纯文本正文 + HTML 备选
pub(crate) fn build_message(mail: &OutgoingMail) -> AppResult<Message> {
    let from = Mailbox::new(Some(mail.from_name.clone()), parse_address(&mail.from_address)?);

    let mut builder = Message::builder().from(from).subject(&mail.subject);
    for recipient in &mail.to {
        builder = builder.to(Mailbox::new(None, parse_address(recipient)?));
    }

    let text = SinglePart::builder()
        .header(header::ContentType::TEXT_PLAIN)
        .body(mail.text_body.clone());

    let body = match &mail.html_body {
        Some(html) => MultiPart::alternative().singlepart(text).singlepart(
            SinglePart::builder()
                .header(header::ContentType::TEXT_HTML)
                .body(html.clone()),
        ),
        None => MultiPart::alternative().singlepart(text),
    };

    builder
        .multipart(body)
        .map_err(|e| AppError::internal(format!("Failed to build message: {}", e)))
}
