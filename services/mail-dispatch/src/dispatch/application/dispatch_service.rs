//! 发送应用服务
//!
//! 请求侧入口：渲染模板（如有）、落库、投递任务。
//! 返回时邮件尚未发送，投递结果由 Worker 异步写回。

use std::collections::BTreeMap;
use std::sync::Arc;

use mailroom_common::{PagedResult, Pagination, UserId};
use mailroom_errors::{AppError, AppResult};
use serde_json::Value;
use tracing::{debug, error};

use crate::dispatch::application::commands::{
    SendBulkMailCommand, SendBulkTemplateMailCommand, SendMailResponse, SendSingleMailCommand,
    SendSingleTemplateMailCommand, TemplateSelector, stringify_keywords,
};
use crate::dispatch::application::outbox::{DispatchOutbox, SendRequest};
use crate::dispatch::application::task_dispatcher::TaskDispatcher;
use crate::dispatch::domain::entities::{
    DeliveryRecord, MailAttributes, MailId, MailKind, MailRecord, MailRecordRef, SendMailJob,
};
use crate::dispatch::domain::repositories::{DeliveryFilter, DeliveryRepository, MailFilter, MailRepository};
use crate::template::application::TemplateRenderer;

/// 邮件正文
struct MailBody {
    html_body: String,
    text_body: Option<String>,
}

pub struct MailDispatchService {
    outbox: DispatchOutbox,
    dispatcher: TaskDispatcher,
    renderer: Arc<TemplateRenderer>,
    mails: Arc<dyn MailRepository>,
    deliveries: Arc<dyn DeliveryRepository>,
}

impl MailDispatchService {
    pub fn new(
        outbox: DispatchOutbox,
        dispatcher: TaskDispatcher,
        renderer: Arc<TemplateRenderer>,
        mails: Arc<dyn MailRepository>,
        deliveries: Arc<dyn DeliveryRepository>,
    ) -> Self {
        Self {
            outbox,
            dispatcher,
            renderer,
            mails,
            deliveries,
        }
    }

    pub async fn send_single(&self, owner_id: UserId, command: SendSingleMailCommand) -> AppResult<SendMailResponse> {
        let request = SendRequest {
            kind: MailKind::Single,
            sender_address: command.sender,
            sender_name: command.name,
            recipients: vec![command.recipient],
            subject: command.subject,
        };
        let body = MailBody {
            html_body: command.html_body,
            text_body: command.text_body,
        };
        self.dispatch(owner_id, request, body).await
    }

    pub async fn send_single_with_template(
        &self,
        owner_id: UserId,
        command: SendSingleTemplateMailCommand,
    ) -> AppResult<SendMailResponse> {
        let request = SendRequest {
            kind: MailKind::Single,
            sender_address: command.sender,
            sender_name: command.name,
            recipients: vec![command.recipient],
            subject: command.subject,
        };
        let body = self
            .render(owner_id, &command.template, &command.keywords, command.text_body)
            .await?;
        self.dispatch(owner_id, request, body).await
    }

    pub async fn send_bulk(&self, owner_id: UserId, command: SendBulkMailCommand) -> AppResult<SendMailResponse> {
        let request = SendRequest {
            kind: MailKind::Bulk,
            sender_address: command.sender,
            sender_name: command.name,
            recipients: command.recipients,
            subject: command.subject,
        };
        let body = MailBody {
            html_body: command.html_body,
            text_body: command.text_body,
        };
        self.dispatch(owner_id, request, body).await
    }

    pub async fn send_bulk_with_template(
        &self,
        owner_id: UserId,
        command: SendBulkTemplateMailCommand,
    ) -> AppResult<SendMailResponse> {
        let request = SendRequest {
            kind: MailKind::Bulk,
            sender_address: command.sender,
            sender_name: command.name,
            recipients: command.recipients,
            subject: command.subject,
        };
        let body = self
            .render(owner_id, &command.template, &command.keywords, command.text_body)
            .await?;
        self.dispatch(owner_id, request, body).await
    }

    /// 查询邮件记录，非本人或类型不符视为不存在
    pub async fn get_mail(&self, owner_id: UserId, kind: MailKind, id: MailId) -> AppResult<MailRecord> {
        let mail = self
            .mails
            .find_by_id(&id)
            .await?
            .filter(|mail| mail.owner_id == owner_id)
            .ok_or_else(|| AppError::not_found(format!("{} mail {} not found", kind, id)))?;
        mail.ensure_kind(kind)?;
        Ok(mail)
    }

    pub async fn list_mails(
        &self,
        owner_id: UserId,
        kind: MailKind,
        pagination: Pagination,
    ) -> AppResult<PagedResult<MailRecord>> {
        let filter = MailFilter {
            owner_id,
            kind: Some(kind),
        };
        self.mails.index(&filter, &pagination).await
    }

    pub async fn delete_mail(&self, owner_id: UserId, kind: MailKind, id: MailId) -> AppResult<()> {
        let mail = self.get_mail(owner_id, kind, id).await?;
        self.mails.delete_by_id(&mail.id, owner_id).await
    }

    /// 查询邮件的投递记录
    pub async fn get_delivery(&self, owner_id: UserId, kind: MailKind, id: MailId) -> AppResult<DeliveryRecord> {
        let mail = self.get_mail(owner_id, kind, id).await?;
        self.deliveries
            .find(&DeliveryFilter { mail: mail.mail_ref() })
            .await?
            .ok_or_else(|| AppError::not_found(format!("Delivery record of mail {} not found", id)))
    }

    pub async fn list_deliveries(
        &self,
        owner_id: UserId,
        pagination: Pagination,
    ) -> AppResult<PagedResult<DeliveryRecord>> {
        self.deliveries.index(&owner_id, &pagination).await
    }

    async fn render(
        &self,
        owner_id: UserId,
        selector: &TemplateSelector,
        keywords: &BTreeMap<String, Value>,
        text_body: Option<String>,
    ) -> AppResult<MailBody> {
        let template = self.renderer.resolve(&selector.to_filter(owner_id)?).await?;
        let rendered = self.renderer.render(&template, &stringify_keywords(keywords)).await?;

        debug!(template_id = %template.id, body = %rendered.redacted_message, "Template rendered");

        Ok(MailBody {
            html_body: rendered.message,
            text_body,
        })
    }

    async fn dispatch(&self, owner_id: UserId, request: SendRequest, body: MailBody) -> AppResult<SendMailResponse> {
        let entry = self.outbox.create_send_request(owner_id, request).await?;

        let job = SendMailJob::new(
            MailAttributes {
                account_id: entry.account.id,
                sender_address: entry.mail.sender_address.clone(),
                sender_name: entry.mail.sender_name.clone(),
                recipients: entry.mail.recipients.clone(),
                subject: entry.mail.subject.clone(),
                html_body: body.html_body,
                text_body: body.text_body,
            },
            MailRecordRef::new(entry.delivery.id, entry.mail.mail_ref()),
        );

        if let Err(e) = self.dispatcher.enqueue(&job).await {
            error!(
                mail_id = %entry.mail.id,
                delivery_id = %entry.delivery.id,
                "Send request recorded but not enqueued, delivery stays not_sent_to_provider"
            );
            return Err(e);
        }

        Ok(SendMailResponse {
            id: entry.mail.id,
            is_success: true,
        })
    }
}
