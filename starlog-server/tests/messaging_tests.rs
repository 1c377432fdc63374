//! Fan-out, delivery and acknowledgment tests
//!
//! Exercises the durable message queue end to end at the service layer:
//! per-receiver fan-out with deduplication, best-effort delivery that
//! never mutates persisted state, replay ordering, and the idempotent
//! owner-checked acknowledgment.

use chrono::{Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use starlog_common::db::models::{ChangeMessage, MessageStatus};
use starlog_common::db::{init_database, messages};
use starlog_common::events::EntityType;
use starlog_common::Error;
use starlog_server::messaging::{ChangeNotifier, DeliveryService, MessageFanout, MessageService};
use starlog_server::ws::{ConnectionHandle, ConnectionRegistry};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

async fn test_db() -> (TempDir, SqlitePool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = init_database(&dir.path().join("starlog.db"))
        .await
        .expect("init_database");
    (dir, pool)
}

fn fanout(db: &SqlitePool, registry: &Arc<ConnectionRegistry>) -> MessageFanout {
    MessageFanout::new(db.clone(), DeliveryService::new(Arc::clone(registry)))
}

#[tokio::test]
async fn publish_deduplicates_receivers() {
    let (_dir, db) = test_db().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let fanout = fanout(&db, &registry);

    let entity_id = Uuid::new_v4();
    let receivers = vec![
        "u1".to_string(),
        "u2".to_string(),
        "u1".to_string(),
    ];

    let created = fanout
        .publish(entity_id, EntityType::LogEntry, "u1", &receivers)
        .await
        .expect("publish");

    // Exactly one message per unique receiver, each pending, distinct ids
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].receiver_user_id, "u1");
    assert_eq!(created[1].receiver_user_id, "u2");
    assert_ne!(created[0].id, created[1].id);
    for message in &created {
        assert_eq!(message.status, MessageStatus::Pending);
        assert!(message.acknowledged_at.is_none());
    }
}

#[tokio::test]
async fn separate_publishes_produce_independent_message_sets() {
    let (_dir, db) = test_db().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let fanout = fanout(&db, &registry);

    let entity_id = Uuid::new_v4();
    let receivers = vec!["u1".to_string()];

    fanout
        .publish(entity_id, EntityType::LogEntry, "u1", &receivers)
        .await
        .expect("first publish");
    fanout
        .publish(entity_id, EntityType::LogEntry, "u1", &receivers)
        .await
        .expect("second publish");

    let pending = messages::pending_for_receiver(&db, "u1")
        .await
        .expect("pending");
    assert_eq!(pending.len(), 2, "no cross-publish deduplication");
}

#[tokio::test]
async fn delivery_pushes_to_live_connection_without_touching_state() {
    let (_dir, db) = test_db().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let fanout = fanout(&db, &registry);

    let (tx, mut rx) = mpsc::unbounded_channel();
    registry.register("u1", ConnectionHandle::new(tx));

    let created = fanout
        .publish(Uuid::new_v4(), EntityType::LogEntry, "u2", &["u1".to_string()])
        .await
        .expect("publish");

    let wire = rx.recv().await.expect("payload should arrive");
    assert!(wire.contains(&created[0].id.to_string()));
    assert!(wire.contains(r#""entityType":"log_entry""#));

    // Delivered, but still PENDING until the client acknowledges
    let stored = messages::find_by_id(&db, created[0].id)
        .await
        .expect("find")
        .expect("stored");
    assert_eq!(stored.status, MessageStatus::Pending);
}

#[tokio::test]
async fn message_without_connection_stays_pending_for_replay() {
    let (_dir, db) = test_db().await;
    let registry = Arc::new(ConnectionRegistry::new());
    let fanout = fanout(&db, &registry);

    let created = fanout
        .publish(Uuid::new_v4(), EntityType::LogEntry, "u2", &["u1".to_string()])
        .await
        .expect("publish");

    // No connection registered: nothing lost, nothing duplicated
    let service = MessageService::new(db.clone());
    let pending = service.pending_for("u1").await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, created[0].id);
}

#[tokio::test]
async fn replay_order_is_oldest_first_and_skips_acknowledged() {
    let (_dir, db) = test_db().await;

    let entity_id = Uuid::new_v4();
    let base = Utc::now();

    let mut older = ChangeMessage::new(entity_id, EntityType::LogEntry, "u2", "u1");
    older.created_at = base - ChronoDuration::seconds(60);
    let mut newer = ChangeMessage::new(entity_id, EntityType::LogEntry, "u2", "u1");
    newer.created_at = base;
    let mut acked = ChangeMessage::new(entity_id, EntityType::LogEntry, "u2", "u1");
    acked.created_at = base - ChronoDuration::seconds(30);
    acked.status = MessageStatus::Acknowledged;
    acked.acknowledged_at = Some(base);

    // Insert newest first to prove ordering comes from created_at
    messages::insert_batch(&db, &[newer.clone(), acked, older.clone()])
        .await
        .expect("insert");

    let service = MessageService::new(db.clone());
    let pending = service.pending_for("u1").await.expect("pending");

    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, older.id);
    assert_eq!(pending[1].id, newer.id);
}

#[tokio::test]
async fn acknowledge_sets_status_and_timestamp_idempotently() {
    let (_dir, db) = test_db().await;
    let message = ChangeMessage::new(Uuid::new_v4(), EntityType::LogEntry, "u2", "u1");
    messages::insert_batch(&db, std::slice::from_ref(&message))
        .await
        .expect("insert");

    let service = MessageService::new(db.clone());

    let first = service
        .acknowledge(message.id, "u1")
        .await
        .expect("first ack");
    assert_eq!(first.status, MessageStatus::Acknowledged);
    let first_ts = first.acknowledged_at.expect("timestamp set");

    // Re-acknowledging succeeds again and refreshes the timestamp
    let second = service
        .acknowledge(message.id, "u1")
        .await
        .expect("second ack");
    assert_eq!(second.status, MessageStatus::Acknowledged);
    let second_ts = second.acknowledged_at.expect("timestamp set");
    assert!(second_ts >= first_ts);

    let stored = messages::find_by_id(&db, message.id)
        .await
        .expect("find")
        .expect("stored");
    assert_eq!(stored.status, MessageStatus::Acknowledged);
    assert!(stored.acknowledged_at.is_some());
}

#[tokio::test]
async fn acknowledging_foreign_message_reads_as_not_found() {
    let (_dir, db) = test_db().await;
    let message = ChangeMessage::new(Uuid::new_v4(), EntityType::LogEntry, "u2", "u1");
    messages::insert_batch(&db, std::slice::from_ref(&message))
        .await
        .expect("insert");

    let service = MessageService::new(db.clone());

    let foreign = service.acknowledge(message.id, "intruder").await;
    let missing = service.acknowledge(Uuid::new_v4(), "intruder").await;

    // Both fail, and both fail the same way - existence is not leaked
    let foreign_err = match foreign {
        Err(Error::NotFound(msg)) => msg,
        other => panic!("expected NotFound, got {other:?}"),
    };
    assert!(matches!(missing, Err(Error::NotFound(_))));
    assert!(foreign_err.contains(&message.id.to_string()));

    // And the message itself is untouched
    let stored = messages::find_by_id(&db, message.id)
        .await
        .expect("find")
        .expect("stored");
    assert_eq!(stored.status, MessageStatus::Pending);
}
