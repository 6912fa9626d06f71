mod helpers;

use chrono::Utc;
use helpers::{setup_ctx, wait_until, WebhookServer};
use nudge_api::{NudgeError, ReminderService};
use nudge_domain::{ReminderPayload, ReminderStatus, ID};
use std::time::Duration;

fn payload() -> ReminderPayload {
    ReminderPayload {
        to: "whatsapp:+4700000000".into(),
        message: "Standup!".into(),
    }
}

#[tokio::test]
async fn delivers_a_due_reminder_exactly_once() {
    let server = WebhookServer::spawn(0).await;
    let (ctx, _guard) = setup_ctx(&server.url).await;
    let service = ReminderService::new(ctx.clone());

    let dto = service
        .schedule_reminder(
            "Standup".into(),
            "Daily standup in 5 minutes".into(),
            Utc::now() + chrono::Duration::milliseconds(600),
            payload(),
        )
        .await
        .expect("To schedule reminder");
    assert_eq!(dto.status, ReminderStatus::Pending);

    let id = dto.reminder_id.parse::<ID>().unwrap();
    let delivered = wait_until(Duration::from_secs(8), || {
        let ctx = ctx.clone();
        let id = id.clone();
        async move {
            matches!(
                ctx.repos.reminders.find(&id).await,
                Some(reminder) if reminder.status == ReminderStatus::Sent
            )
        }
    })
    .await;
    assert!(delivered, "reminder was not delivered in time");
    service.shutdown().await;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].reminder_id.as_deref(), Some(dto.reminder_id.as_str()));
    assert_eq!(requests[0].attempts.as_deref(), Some("0"));
    assert_eq!(requests[0].body["title"], "Standup");
    assert_eq!(requests[0].body["payload"]["to"], "whatsapp:+4700000000");
    assert_eq!(requests[0].body["target_time_iso"], dto.target_time_iso);

    let stored = ctx.repos.reminders.find(&id).await.unwrap();
    assert_eq!(stored.attempts, 1);
    assert!(stored.sent_at.is_some());
}

#[tokio::test]
async fn retries_failed_deliveries_until_the_webhook_accepts() {
    // First two deliveries get a 500 back
    let server = WebhookServer::spawn(2).await;
    let (ctx, _guard) = setup_ctx(&server.url).await;
    let service = ReminderService::new(ctx.clone());

    let dto = service
        .schedule_reminder(
            "Flaky".into(),
            "Keep trying".into(),
            Utc::now() + chrono::Duration::milliseconds(400),
            payload(),
        )
        .await
        .expect("To schedule reminder");

    let id = dto.reminder_id.parse::<ID>().unwrap();
    let delivered = wait_until(Duration::from_secs(10), || {
        let ctx = ctx.clone();
        let id = id.clone();
        async move {
            matches!(
                ctx.repos.reminders.find(&id).await,
                Some(reminder) if reminder.status == ReminderStatus::Sent
            )
        }
    })
    .await;
    assert!(delivered, "reminder was not delivered in time");
    service.shutdown().await;

    let stored = ctx.repos.reminders.find(&id).await.unwrap();
    assert_eq!(stored.attempts, 3);
    assert_eq!(server.requests().len(), 3);
    // The final delivery carries the prior attempt count
    assert_eq!(server.requests()[2].attempts.as_deref(), Some("2"));
}

#[tokio::test]
async fn cancelled_reminders_are_never_delivered() {
    let server = WebhookServer::spawn(0).await;
    let (ctx, _guard) = setup_ctx(&server.url).await;
    let service = ReminderService::new(ctx.clone());

    let dto = service
        .schedule_reminder(
            "Obsolete".into(),
            "Should never fire".into(),
            Utc::now() + chrono::Duration::milliseconds(800),
            payload(),
        )
        .await
        .expect("To schedule reminder");

    let id = dto.reminder_id.parse::<ID>().unwrap();
    let cancelled = service
        .cancel_reminder(id.clone())
        .await
        .expect("To cancel reminder");
    assert_eq!(cancelled.status, ReminderStatus::Cancelled);

    // Well past the original target time
    tokio::time::sleep(Duration::from_millis(1500)).await;
    service.shutdown().await;

    assert!(server.requests().is_empty());

    let listed = service
        .list_reminders(Some(ReminderStatus::Cancelled), 100)
        .await
        .expect("To list reminders");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].reminder_id, dto.reminder_id);

    // Cancelling again is rejected
    assert!(matches!(
        service.cancel_reminder(id).await,
        Err(NudgeError::BadClientData(_))
    ));
}

#[tokio::test]
async fn rejects_reminders_scheduled_in_the_past() {
    let server = WebhookServer::spawn(0).await;
    let (ctx, _guard) = setup_ctx(&server.url).await;
    let service = ReminderService::new(ctx);

    let result = service
        .schedule_reminder(
            "Late".into(),
            "Too late".into(),
            Utc::now() - chrono::Duration::minutes(1),
            payload(),
        )
        .await;
    assert!(matches!(result, Err(NudgeError::BadClientData(_))));
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn delivers_reminders_persisted_by_a_previous_run() {
    let server = WebhookServer::spawn(0).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir
        .path()
        .join("reminders.db")
        .to_str()
        .unwrap()
        .to_string();

    // First run schedules but never gets to deliver
    let ctx = helpers::setup_ctx_at(&path, &server.url).await;
    let service = ReminderService::new(ctx);
    let dto = service
        .schedule_reminder(
            "Survivor".into(),
            "Outlives the process".into(),
            Utc::now() + chrono::Duration::milliseconds(500),
            payload(),
        )
        .await
        .expect("To schedule reminder");
    service.shutdown().await;

    // Second run over the same store picks it up on startup
    let ctx = helpers::setup_ctx_at(&path, &server.url).await;
    let service = ReminderService::new(ctx.clone());
    assert!(service.ensure_dispatcher_running().await);

    let id = dto.reminder_id.parse::<ID>().unwrap();
    let delivered = wait_until(Duration::from_secs(8), || {
        let ctx = ctx.clone();
        let id = id.clone();
        async move {
            matches!(
                ctx.repos.reminders.find(&id).await,
                Some(reminder) if reminder.status == ReminderStatus::Sent
            )
        }
    })
    .await;
    assert!(delivered, "reminder was not delivered after restart");
    service.shutdown().await;

    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn sends_one_shot_messages_with_a_receipt() {
    let server = WebhookServer::spawn(0).await;
    let (ctx, _guard) = setup_ctx(&server.url).await;
    let service = ReminderService::new(ctx);

    let receipt = service
        .send_message("whatsapp:+4700000000".into(), "hello there".into())
        .await
        .expect("To send message");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].message_id.as_deref(),
        Some(receipt.message_id.as_str())
    );
    assert_eq!(requests[0].body["to"], "whatsapp:+4700000000");
    assert_eq!(requests[0].body["message"], "hello there");
}

#[tokio::test]
async fn triggers_research_with_the_expected_envelope() {
    let server = WebhookServer::spawn(0).await;
    let (ctx, _guard) = setup_ctx(&server.url).await;
    let service = ReminderService::new(ctx);

    let receipt = service
        .trigger_research("rust async runtimes".into(), "dev@example.com".into())
        .await
        .expect("To trigger research");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].research_id.as_deref(),
        Some(receipt.research_id.as_str())
    );
    // Single-element array with the exact field names the automation expects
    assert_eq!(requests[0].body[0]["Search Topic"], "rust async runtimes");
    assert_eq!(requests[0].body[0]["Email"], "dev@example.com");
}
