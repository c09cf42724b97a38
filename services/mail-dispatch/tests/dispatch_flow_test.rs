mod support;

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use mail_dispatch::dispatch::application::{
    SendBulkMailCommand, SendBulkTemplateMailCommand, SendOutcome, SendSingleMailCommand,
    SendSingleTemplateMailCommand, TemplateSelector,
};
use mail_dispatch::dispatch::domain::entities::{DeliveryStatus, MailKind, MailRef};
use mail_dispatch::template::application::{AddTemplateCommand, TemplateFile, TemplateService};
use mail_dispatch::template::domain::entities::Placeholder;
use mailroom_common::{Pagination, UserId};
use mailroom_errors::AppError;
use serde_json::json;
use support::{Harness, PASSWORD, SENDER, STREAM, recipients};

fn single(recipient: &str) -> SendSingleMailCommand {
    SendSingleMailCommand {
        sender: SENDER.to_string(),
        name: None,
        recipient: recipient.to_string(),
        subject: "Welcome".to_string(),
        html_body: "<p>Hello</p>".to_string(),
        text_body: None,
    }
}

async fn add_template(h: &Harness) {
    let service = TemplateService::new(h.store.clone(), h.remote.clone(), h.cache.clone());
    service
        .add(
            h.owner,
            AddTemplateCommand {
                name: "otp".to_string(),
                file: Some(TemplateFile {
                    file_name: "otp.html".to_string(),
                    content: b"<p>{{ name }}: {{ otp }}</p>".to_vec(),
                }),
                placeholders: vec![Placeholder::new("name", false), Placeholder::new("otp", true)],
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_send_single_records_and_enqueues() {
    let h = Harness::new().await;

    let response = h.service.send_single(h.owner, single("ada@example.com")).await.unwrap();
    assert!(response.is_success);

    let mail = h.store.mail(&response.id).unwrap();
    assert_eq!(mail.kind, MailKind::Single);
    assert_eq!(mail.recipients, vec!["ada@example.com"]);
    assert_eq!(mail.sender_name, "Ops Team");

    let delivery = h.store.only_delivery();
    assert_eq!(delivery.mail, MailRef::Single(response.id));
    assert_eq!(delivery.status, DeliveryStatus::NotSentToProvider);

    let payloads = h.queue.payloads.lock().unwrap().clone();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].0, STREAM);
    assert!(!payloads[0].1.contains(PASSWORD));

    let job = &h.queue.jobs()[0];
    assert_eq!(job.mail_record.delivery_id, delivery.id);
    assert_eq!(job.mail_record.single_mail_id, Some(response.id));
    assert_eq!(job.mail_attr.account_id, h.account.id);

    assert_eq!(h.drain_queue().await, vec![SendOutcome::Sent]);
    let delivery = h.store.only_delivery();
    assert_eq!(delivery.status, DeliveryStatus::SentToProvider);
    assert_eq!(delivery.sent_recipients, 1);
    assert_eq!(h.transport.passwords.lock().unwrap().clone(), vec![PASSWORD]);
}

#[tokio::test]
async fn test_explicit_sender_name_wins() {
    let h = Harness::new().await;
    let mut command = single("ada@example.com");
    command.name = Some("Billing".to_string());

    let response = h.service.send_single(h.owner, command).await.unwrap();

    assert_eq!(h.store.mail(&response.id).unwrap().sender_name, "Billing");
    assert_eq!(h.queue.jobs()[0].mail_attr.sender_name, "Billing");
}

#[tokio::test]
async fn test_unknown_sender_writes_nothing() {
    let h = Harness::new().await;
    let mut command = single("ada@example.com");
    command.sender = "nobody@example.com".to_string();

    let err = h.service.send_single(h.owner, command).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.store.mail_count(), 0);
    assert!(h.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_sender_of_other_owner_is_not_found() {
    let h = Harness::new().await;

    let err = h
        .service
        .send_single(UserId::new(), single("ada@example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.store.mail_count(), 0);
}

#[tokio::test]
async fn test_invalid_recipient_writes_nothing() {
    let h = Harness::new().await;

    let err = h
        .service
        .send_bulk(
            h.owner,
            SendBulkMailCommand {
                sender: SENDER.to_string(),
                name: None,
                recipients: vec!["ada@example.com".to_string(), "not-an-address".to_string()],
                subject: "Hi".to_string(),
                html_body: "<p>Hi</p>".to_string(),
                text_body: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.store.mail_count(), 0);
    assert_eq!(h.store.delivery_count(), 0);
    assert!(h.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_bulk_deduplicates_recipients() {
    let h = Harness::new().await;

    let response = h
        .service
        .send_bulk(
            h.owner,
            SendBulkMailCommand {
                sender: SENDER.to_string(),
                name: None,
                recipients: vec![
                    "ada@example.com".to_string(),
                    "ADA@example.com".to_string(),
                    "bob@example.com".to_string(),
                ],
                subject: "Hi".to_string(),
                html_body: "<p>Hi</p>".to_string(),
                text_body: Some("Hi".to_string()),
            },
        )
        .await
        .unwrap();

    let mail = h.store.mail(&response.id).unwrap();
    assert_eq!(mail.kind, MailKind::Bulk);
    assert_eq!(mail.recipients.len(), 2);
    assert_eq!(h.queue.jobs()[0].mail_record.bulk_mail_id, Some(response.id));
}

#[tokio::test]
async fn test_broker_failure_keeps_records_unsent() {
    let h = Harness::new().await;
    h.queue.unavailable.store(true, Ordering::SeqCst);

    let err = h.service.send_single(h.owner, single("ada@example.com")).await.unwrap_err();

    assert!(matches!(err, AppError::BrokerUnavailable(_)));
    assert_eq!(h.store.mail_count(), 1);
    let delivery = h.store.only_delivery();
    assert_eq!(delivery.status, DeliveryStatus::NotSentToProvider);
    assert_eq!(delivery.sent_recipients, 0);
}

#[tokio::test]
async fn test_outbox_failure_enqueues_nothing() {
    let h = Harness::new().await;
    h.store.fail_outbox.store(true, Ordering::SeqCst);

    let err = h.service.send_single(h.owner, single("ada@example.com")).await.unwrap_err();

    assert!(matches!(err, AppError::Database(_)));
    assert!(h.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_template_send_renders_real_values() {
    let h = Harness::new().await;
    add_template(&h).await;

    let keywords: BTreeMap<_, _> = [
        ("name".to_string(), json!("Ada")),
        ("otp".to_string(), json!(123456)),
    ]
    .into_iter()
    .collect();
    h.service
        .send_single_with_template(
            h.owner,
            SendSingleTemplateMailCommand {
                sender: SENDER.to_string(),
                name: None,
                recipient: "ada@example.com".to_string(),
                subject: "Your code".to_string(),
                template: TemplateSelector::by_name("otp"),
                keywords,
                text_body: None,
            },
        )
        .await
        .unwrap();

    let job = &h.queue.jobs()[0];
    assert_eq!(job.mail_attr.html_body, "<p>Ada: 123456</p>");
}

#[tokio::test]
async fn test_missing_template_writes_nothing() {
    let h = Harness::new().await;

    let err = h
        .service
        .send_bulk_with_template(
            h.owner,
            SendBulkTemplateMailCommand {
                sender: SENDER.to_string(),
                name: None,
                recipients: recipients(3),
                subject: "Hi".to_string(),
                template: TemplateSelector::by_name("missing"),
                keywords: BTreeMap::new(),
                text_body: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(h.store.mail_count(), 0);
    assert!(h.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_template_selector_required() {
    let h = Harness::new().await;

    let err = h
        .service
        .send_bulk_with_template(
            h.owner,
            SendBulkTemplateMailCommand {
                sender: SENDER.to_string(),
                name: None,
                recipients: recipients(1),
                subject: "Hi".to_string(),
                template: TemplateSelector::default(),
                keywords: BTreeMap::new(),
                text_body: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn test_mail_queries_respect_kind_and_owner() {
    let h = Harness::new().await;
    let response = h.service.send_single(h.owner, single("ada@example.com")).await.unwrap();

    let mail = h.service.get_mail(h.owner, MailKind::Single, response.id).await.unwrap();
    assert_eq!(mail.id, response.id);

    let err = h.service.get_mail(h.owner, MailKind::Bulk, response.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = h
        .service
        .get_mail(UserId::new(), MailKind::Single, response.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let delivery = h.service.get_delivery(h.owner, MailKind::Single, response.id).await.unwrap();
    assert_eq!(delivery.mail, MailRef::Single(response.id));

    let singles = h
        .service
        .list_mails(h.owner, MailKind::Single, Pagination::new(1, 20))
        .await
        .unwrap();
    assert_eq!(singles.total, 1);
    let bulks = h
        .service
        .list_mails(h.owner, MailKind::Bulk, Pagination::new(1, 20))
        .await
        .unwrap();
    assert_eq!(bulks.total, 0);

    let deliveries = h.service.list_deliveries(h.owner, Pagination::new(1, 20)).await.unwrap();
    assert_eq!(deliveries.items.len(), 1);
}

#[tokio::test]
async fn test_delete_mail_hides_it() {
    let h = Harness::new().await;
    let response = h.service.send_single(h.owner, single("ada@example.com")).await.unwrap();

    h.service.delete_mail(h.owner, MailKind::Single, response.id).await.unwrap();

    let err = h.service.get_mail(h.owner, MailKind::Single, response.id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}
