mod support;

use std::sync::atomic::Ordering;

use mail_dispatch::dispatch::application::BulkMailEventListener;
use mail_dispatch::dispatch::domain::entities::MailKind;
use mail_dispatch::template::application::{AddTemplateCommand, TemplateFile, TemplateService};
use mail_dispatch::template::domain::entities::Placeholder;
use mailroom_errors::AppError;
use serde_json::json;
use support::{Harness, SENDER};

fn listener(h: &Harness) -> BulkMailEventListener {
    BulkMailEventListener::new(h.service.clone())
}

#[tokio::test]
async fn test_event_is_recorded_and_enqueued() {
    let h = Harness::new().await;
    let payload = json!({
        "user_id": h.owner,
        "sender": SENDER,
        "recipients": ["ada@example.com", "bob@example.com"],
        "subject": "Release notes",
        "html_body": "<p>v2 is out</p>",
    });

    listener(&h).handle(&payload.to_string()).await.unwrap();

    let jobs = h.queue.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].mail_attr.recipients.len(), 2);
    assert_eq!(jobs[0].mail_attr.html_body, "<p>v2 is out</p>");
    let mail = h.store.mail(&jobs[0].mail_record.bulk_mail_id.unwrap()).unwrap();
    assert_eq!(mail.kind, MailKind::Bulk);
}

#[tokio::test]
async fn test_malformed_event_is_dropped() {
    let h = Harness::new().await;

    listener(&h).handle("{not json").await.unwrap();
    listener(&h)
        .handle(&json!({ "sender": SENDER }).to_string())
        .await
        .unwrap();

    assert!(h.queue.jobs().is_empty());
    assert_eq!(h.store.mail_count(), 0);
}

#[tokio::test]
async fn test_event_without_body_or_template_is_dropped() {
    let h = Harness::new().await;
    let payload = json!({
        "user_id": h.owner,
        "sender": SENDER,
        "recipients": ["ada@example.com"],
        "subject": "Empty",
    });

    listener(&h).handle(&payload.to_string()).await.unwrap();

    assert_eq!(h.store.mail_count(), 0);
}

#[tokio::test]
async fn test_unknown_sender_is_dropped() {
    let h = Harness::new().await;
    let payload = json!({
        "user_id": h.owner,
        "sender": "nobody@example.com",
        "recipients": ["ada@example.com"],
        "subject": "Hi",
        "html_body": "<p>Hi</p>",
    });

    listener(&h).handle(&payload.to_string()).await.unwrap();

    assert!(h.queue.jobs().is_empty());
}

#[tokio::test]
async fn test_broker_outage_is_returned_for_retry() {
    let h = Harness::new().await;
    h.queue.unavailable.store(true, Ordering::SeqCst);
    let payload = json!({
        "user_id": h.owner,
        "sender": SENDER,
        "recipients": ["ada@example.com"],
        "subject": "Hi",
        "html_body": "<p>Hi</p>",
    });

    let err = listener(&h).handle(&payload.to_string()).await.unwrap_err();

    assert!(matches!(err, AppError::BrokerUnavailable(_)));
}

#[tokio::test]
async fn test_template_event_renders_body() {
    let h = Harness::new().await;
    TemplateService::new(h.store.clone(), h.remote.clone(), h.cache.clone())
        .add(
            h.owner,
            AddTemplateCommand {
                name: "digest".to_string(),
                file: Some(TemplateFile {
                    file_name: "digest.html".to_string(),
                    content: b"<p>{{ count }} new items</p>".to_vec(),
                }),
                placeholders: vec![Placeholder::new("count", false)],
            },
        )
        .await
        .unwrap();
    let payload = json!({
        "user_id": h.owner,
        "sender": SENDER,
        "name": "Digest Bot",
        "recipients": ["ada@example.com"],
        "subject": "Weekly digest",
        "template_name": "digest",
        "keywords": { "count": 7 },
    });

    listener(&h).handle(&payload.to_string()).await.unwrap();

    let job = &h.queue.jobs()[0];
    assert_eq!(job.mail_attr.html_body, "<p>7 new items</p>");
    assert_eq!(job.mail_attr.sender_name, "Digest Bot");
}
