//! 群发事件监听器
//!
//! 消费事件总线上的群发请求，交给发送服务处理。
//! 业务错误记录后视为已处理；基础设施错误返回给消费者，由其重试或转入死信。

use std::collections::BTreeMap;
use std::sync::Arc;

use mailroom_common::UserId;
use mailroom_errors::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::dispatch::application::commands::{
    SendBulkMailCommand, SendBulkTemplateMailCommand, SendMailResponse, TemplateSelector,
};
use crate::dispatch::application::dispatch_service::MailDispatchService;

/// 群发事件
#[derive(Debug, Clone, Deserialize)]
pub struct BulkMailEvent {
    pub user_id: UserId,
    pub sender: String,
    #[serde(default)]
    pub name: Option<String>,
    pub recipients: Vec<String>,
    pub subject: String,
    #[serde(default)]
    pub html_body: Option<String>,
    #[serde(default)]
    pub text_body: Option<String>,
    #[serde(flatten)]
    pub template: TemplateSelector,
    #[serde(default)]
    pub keywords: BTreeMap<String, Value>,
}

pub struct BulkMailEventListener {
    service: Arc<MailDispatchService>,
}

impl BulkMailEventListener {
    pub fn new(service: Arc<MailDispatchService>) -> Self {
        Self { service }
    }

    /// 处理一条事件，返回 Err 表示需要重试
    pub async fn handle(&self, payload: &str) -> AppResult<()> {
        let result = match serde_json::from_str::<BulkMailEvent>(payload) {
            Ok(event) => self.dispatch(event).await,
            Err(e) => Err(AppError::from(e)),
        };

        match result {
            Ok(response) => {
                info!(mail_id = %response.id, "Bulk mail event processed");
                Ok(())
            }
            Err(e) if e.is_retryable() => Err(e),
            Err(e) => {
                warn!(error = %e, "Bulk mail event rejected");
                Ok(())
            }
        }
    }

    async fn dispatch(&self, event: BulkMailEvent) -> AppResult<SendMailResponse> {
        if event.template.is_empty() {
            let html_body = event
                .html_body
                .ok_or_else(|| AppError::validation("html_body is required without a template"))?;

            let command = SendBulkMailCommand {
                sender: event.sender,
                name: event.name,
                recipients: event.recipients,
                subject: event.subject,
                html_body,
                text_body: event.text_body,
            };
            self.service.send_bulk(event.user_id, command).await
        } else {
            let command = SendBulkTemplateMailCommand {
                sender: event.sender,
                name: event.name,
                recipients: event.recipients,
                subject: event.subject,
                template: event.template,
                keywords: event.keywords,
                text_body: event.text_body,
            };
            self.service.send_bulk_with_template(event.user_id, command).await
        }
    }
}
