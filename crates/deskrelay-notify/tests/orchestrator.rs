// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end orchestrator tests: creation fan-out, idempotent triggers,
//! read-state mutations, threading, and live delivery through the bus.

use std::sync::Arc;
use std::time::Duration;

use deskrelay_bus::LocalBus;
use deskrelay_config::model::RelayConfig;
use deskrelay_core::{
    events, DeliveryChannel, DeliveryStatus, DigestMode, JobPayload, NotificationKind,
    RelayError, Role, TicketInfo, Transport, UserPreference,
};
use deskrelay_notify::{run_subscriber, CreateNotification, NotificationService};
use deskrelay_queue::{run_once, WorkerPoolConfig};
use deskrelay_storage::queries::notifications::NotificationFilter;
use deskrelay_storage::queries::{delivery, jobs, preferences};
use deskrelay_storage::Database;
use deskrelay_test_utils::{MockLivePush, MockTransport, StaticDirectory, TestDb};
use tokio_util::sync::CancellationToken;

struct World {
    _harness: TestDb,
    db: Database,
    bus: Arc<LocalBus>,
    directory: Arc<StaticDirectory>,
    service: NotificationService,
}

async fn world(directory: StaticDirectory) -> World {
    let harness = TestDb::new().await.unwrap();
    let db = harness.db.clone();
    let bus = Arc::new(LocalBus::new());
    let directory = Arc::new(directory);
    let service = NotificationService::new(
        db.clone(),
        bus.clone(),
        directory.clone(),
        &RelayConfig::default(),
    );
    World {
        _harness: harness,
        db,
        bus,
        directory,
        service,
    }
}

fn ticket(id: &str, requester: &str, assignee: Option<&str>) -> TicketInfo {
    TicketInfo {
        id: id.to_string(),
        subject: "Printer on fire".to_string(),
        requester_id: requester.to_string(),
        assignee_id: assignee.map(str::to_string),
        status: "open".to_string(),
    }
}

async fn enable_channels(db: &Database, user: &str, kind: NotificationKind, push: bool) {
    let pref = UserPreference {
        push,
        email: true,
        ..UserPreference::defaults_for(user, kind)
    };
    preferences::upsert(db, &pref).await.unwrap();
}

#[tokio::test]
async fn every_kind_yields_a_synchronous_in_app_sent_entry() {
    let w = world(StaticDirectory::new()).await;

    for (i, kind) in [
        NotificationKind::TicketAssigned,
        NotificationKind::TicketMention,
        NotificationKind::SlaBreach,
        NotificationKind::SocialComment,
    ]
    .into_iter()
    .enumerate()
    {
        let n = w
            .service
            .create(CreateNotification::new(
                kind,
                "title",
                "body",
                &format!("u-{i}"),
            ))
            .await
            .unwrap();
        let entry = delivery::entry(&w.db, &n.id, DeliveryChannel::InApp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, DeliveryStatus::Sent, "kind {kind}");
    }
}

#[tokio::test]
async fn in_app_delivery_survives_a_preference_that_disables_it() {
    let w = world(StaticDirectory::new()).await;
    let pref = UserPreference {
        in_app: false,
        ..UserPreference::defaults_for("u-1", NotificationKind::TicketMention)
    };
    preferences::upsert(&w.db, &pref).await.unwrap();

    let n = w
        .service
        .create(CreateNotification::new(
            NotificationKind::TicketMention,
            "You were mentioned",
            "body",
            "u-1",
        ))
        .await
        .unwrap();

    let entry = delivery::entry(&w.db, &n.id, DeliveryChannel::InApp)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn missing_email_address_fails_the_email_channel_only() {
    // Directory has no email on file for u-1.
    let w = world(StaticDirectory::new()).await;
    enable_channels(&w.db, "u-1", NotificationKind::TicketReply, false).await;

    let mut input = CreateNotification::new(
        NotificationKind::TicketReply,
        "New reply",
        "body",
        "u-1",
    );
    input.channels = Some(
        [DeliveryChannel::InApp, DeliveryChannel::Email]
            .into_iter()
            .collect(),
    );
    let n = w.service.create(input).await.unwrap();

    let email = delivery::entry(&w.db, &n.id, DeliveryChannel::Email)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(email.status, DeliveryStatus::Failed);
    assert_eq!(email.error_message.as_deref(), Some("no email address"));

    let in_app = delivery::entry(&w.db, &n.id, DeliveryChannel::InApp)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(in_app.status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn duplicate_trigger_produces_no_second_live_job() {
    let directory = StaticDirectory::new()
        .with_email("agent-1", "agent1@example.com")
        .with_ticket(ticket("t-1", "u-9", Some("agent-1")));
    let w = world(directory).await;
    enable_channels(&w.db, "agent-1", NotificationKind::TicketAssigned, false).await;

    w.service.on_ticket_assigned("t-1", Some("admin-1")).await.unwrap();
    w.service.on_ticket_assigned("t-1", Some("admin-1")).await.unwrap();

    let pending = jobs::count_with_status(&w.db, "email", "pending")
        .await
        .unwrap();
    assert_eq!(pending, 1, "second trigger must be absorbed");
}

#[tokio::test]
async fn unread_count_tracks_creations_minus_reads() {
    let w = world(StaticDirectory::new()).await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let n = w
            .service
            .create(CreateNotification::new(
                NotificationKind::TicketUpdated,
                &format!("update {i}"),
                "body",
                "u-1",
            ))
            .await
            .unwrap();
        ids.push(n.id);
    }
    for id in ids.iter().take(2) {
        w.service.mark_as_read(id, "u-1").await.unwrap();
    }

    let count = w
        .service
        .unread_count("u-1", &NotificationFilter::default())
        .await
        .unwrap();
    assert_eq!(count, 3);
}

#[tokio::test]
async fn mark_as_read_by_non_owner_is_unauthorized_not_silent() {
    let w = world(StaticDirectory::new()).await;
    let n = w
        .service
        .create(CreateNotification::new(
            NotificationKind::TicketUpdated,
            "t",
            "b",
            "owner",
        ))
        .await
        .unwrap();

    let err = w.service.mark_as_read(&n.id, "intruder").await.unwrap_err();
    assert!(matches!(err, RelayError::Unauthorized(_)));
    // Distinct from not-found.
    let err = w.service.mark_as_read("no-such-id", "owner").await.unwrap_err();
    assert!(matches!(err, RelayError::NotFound(_)));

    let count = w
        .service
        .unread_count("owner", &NotificationFilter::default())
        .await
        .unwrap();
    assert_eq!(count, 1, "failed mark must not flip the flag");
}

#[tokio::test]
async fn delete_requires_an_administrator() {
    let directory = StaticDirectory::new()
        .with_role("admin-1", Role::Admin)
        .with_role("agent-1", Role::Agent);
    let w = world(directory).await;
    let n = w
        .service
        .create(CreateNotification::new(
            NotificationKind::TicketUpdated,
            "t",
            "b",
            "u-1",
        ))
        .await
        .unwrap();

    let err = w.service.delete(&n.id, "agent-1").await.unwrap_err();
    assert!(matches!(err, RelayError::Unauthorized(_)));

    w.service.delete(&n.id, "admin-1").await.unwrap();
    let err = w.service.delete(&n.id, "admin-1").await.unwrap_err();
    assert!(matches!(err, RelayError::NotFound(_)));
}

#[tokio::test]
async fn email_threading_references_grow_in_order_without_duplicates() {
    let directory = StaticDirectory::new()
        .with_email("u-1", "u1@example.com")
        .with_ticket(ticket("t-7", "u-1", Some("agent-1")));
    let w = world(directory).await;
    enable_channels(&w.db, "u-1", NotificationKind::TicketReply, false).await;

    let mut seen_references: Vec<Vec<String>> = Vec::new();
    for i in 0..3 {
        w.service
            .on_new_reply("t-7", &format!("r-{i}"), "agent-1", "a reply")
            .await
            .unwrap();

        // Pull the email job the dispatcher enqueued and inspect its
        // threading block, then simulate the worker completing it.
        let job = jobs::dequeue(&w.db, "email").await.unwrap().unwrap();
        let payload: JobPayload = serde_json::from_str(&job.payload).unwrap();
        let threading = payload.threading.clone().unwrap();
        assert_eq!(threading.subject, "Printer on fire");
        seen_references.push(threading.references.clone());

        jobs::complete(&w.db, job.id).await.unwrap();
        delivery::mark_sent(
            &w.db,
            &payload.notification_id,
            DeliveryChannel::Email,
            1,
            Some(&format!("<m-{i}@helpdesk.example>")),
        )
        .await
        .unwrap();
    }

    assert!(seen_references[0].is_empty());
    assert_eq!(seen_references[1], vec!["<m-0@helpdesk.example>"]);
    assert_eq!(
        seen_references[2],
        vec!["<m-0@helpdesk.example>", "<m-1@helpdesk.example>"]
    );
    // The original creation id stays first as the chain grows.
    assert_eq!(seen_references[2][0], seen_references[1][0]);
}

#[tokio::test]
async fn social_duplicates_inside_the_window_are_suppressed() {
    let w = world(StaticDirectory::new()).await;

    w.service
        .on_social_event(
            NotificationKind::SocialComment,
            "agent-1",
            "page-1",
            "post-1",
            "visitor",
            "New comment",
            "body",
        )
        .await
        .unwrap();
    w.service
        .on_social_event(
            NotificationKind::SocialComment,
            "agent-1",
            "page-1",
            "post-1",
            "visitor",
            "New comment",
            "body",
        )
        .await
        .unwrap();

    let count = w
        .service
        .unread_count("agent-1", &NotificationFilter::default())
        .await
        .unwrap();
    assert_eq!(count, 1, "second event inside the window must be dropped");
}

#[tokio::test]
async fn non_social_kind_is_rejected_by_the_social_trigger() {
    let w = world(StaticDirectory::new()).await;
    let err = w
        .service
        .on_social_event(
            NotificationKind::TicketReply,
            "agent-1",
            "page-1",
            "post-1",
            "visitor",
            "t",
            "b",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Validation(_)));
}

#[tokio::test]
async fn hourly_digest_defers_email_into_the_digest_queue() {
    let directory = StaticDirectory::new().with_email("u-1", "u1@example.com");
    let w = world(directory).await;
    let pref = UserPreference {
        email: true,
        digest: DigestMode::Hourly,
        ..UserPreference::defaults_for("u-1", NotificationKind::TicketReply)
    };
    preferences::upsert(&w.db, &pref).await.unwrap();

    w.service
        .create(CreateNotification::new(
            NotificationKind::TicketReply,
            "New reply",
            "body",
            "u-1",
        ))
        .await
        .unwrap();

    // No immediate email job; the event sits in the digest queue instead.
    let pending = jobs::count_with_status(&w.db, "email", "pending")
        .await
        .unwrap();
    assert_eq!(pending, 0);
}

#[tokio::test]
async fn assignment_scenario_delivers_all_channels_and_one_live_event() {
    let directory = StaticDirectory::new()
        .with_email("u-a", "a@example.com")
        .with_ticket(ticket("t-1", "u-9", Some("u-a")));
    let w = world(directory).await;
    enable_channels(&w.db, "u-a", NotificationKind::TicketAssigned, true).await;

    // Live side: one subscriber loop feeding a capturing sink.
    let live = Arc::new(MockLivePush::new());
    let cancel = CancellationToken::new();
    let bus: Arc<dyn deskrelay_core::NotificationBus> = w.bus.clone();
    let sink: Arc<dyn deskrelay_core::LivePush> = live.clone();
    let subscriber = tokio::spawn(run_subscriber(bus, w.db.clone(), sink, cancel.clone()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    w.service.on_ticket_assigned("t-1", Some("admin-1")).await.unwrap();

    // Worker side: drain both queues with mock transports.
    let config = WorkerPoolConfig {
        concurrency: 1,
        backoff_base_secs: 0,
        poll_interval: Duration::from_millis(10),
    };
    let email: Arc<dyn Transport> = Arc::new(MockTransport::succeeding(DeliveryChannel::Email));
    let push: Arc<dyn Transport> = Arc::new(MockTransport::succeeding(DeliveryChannel::Push));
    assert!(run_once("email", &email, &w.db, &config).await.unwrap());
    assert!(run_once("push", &push, &w.db, &config).await.unwrap());

    let notification_id = "assigned:t-1:u-a";
    for channel in [
        DeliveryChannel::InApp,
        DeliveryChannel::Email,
        DeliveryChannel::Push,
    ] {
        let entry = delivery::entry(&w.db, notification_id, channel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.status, DeliveryStatus::Sent, "channel {channel}");
    }

    // Exactly one notification:new reached the assignee's room.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let new_events: Vec<_> = live
        .events_for("user:u-a")
        .into_iter()
        .filter(|e| e.event == events::NOTIFICATION_NEW)
        .collect();
    assert_eq!(new_events.len(), 1);

    cancel.cancel();
    subscriber.await.unwrap();
}

#[tokio::test]
async fn mark_all_read_pushes_reset_events_to_the_user_room() {
    let w = world(StaticDirectory::new()).await;
    let live = Arc::new(MockLivePush::new());
    let cancel = CancellationToken::new();
    let bus: Arc<dyn deskrelay_core::NotificationBus> = w.bus.clone();
    let sink: Arc<dyn deskrelay_core::LivePush> = live.clone();
    let subscriber = tokio::spawn(run_subscriber(bus, w.db.clone(), sink, cancel.clone()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    for i in 0..3 {
        w.service
            .create(CreateNotification::new(
                NotificationKind::TicketUpdated,
                &format!("u {i}"),
                "b",
                "u-1",
            ))
            .await
            .unwrap();
    }
    let flipped = w
        .service
        .mark_all_read("u-1", &NotificationFilter::default())
        .await
        .unwrap();
    assert_eq!(flipped, 3);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let room_events = live.events_for("user:u-1");
    assert!(room_events
        .iter()
        .any(|e| e.event == events::NOTIFICATION_ALL_MARKED_READ));
    // The final unread-count push is the post-reset zero.
    let last_count = room_events
        .iter()
        .rev()
        .find(|e| e.event == events::NOTIFICATION_UNREAD_COUNT)
        .unwrap();
    assert_eq!(last_count.data, serde_json::json!(0));

    cancel.cancel();
    subscriber.await.unwrap();
}
