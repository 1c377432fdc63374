//! Change message database queries
//!
//! Messages are append-only apart from the single pending → acknowledged
//! transition, which is a single-row update and therefore atomic with
//! respect to its own record.

use crate::db::models::{ChangeMessage, MessageStatus};
use crate::error::{Error, Result};
use crate::events::EntityType;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Persist a batch of messages in one transaction
pub async fn insert_batch(db: &SqlitePool, messages: &[ChangeMessage]) -> Result<()> {
    let mut tx = db.begin().await?;

    for message in messages {
        sqlx::query(
            r#"
            INSERT INTO entity_changed_messages (
                guid, entity_id, entity_type, changed_by_user_id,
                receiver_user_id, status, created_at, acknowledged_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(message.id.to_string())
        .bind(message.entity_id.to_string())
        .bind(message.entity_type.as_str())
        .bind(&message.changed_by_user_id)
        .bind(&message.receiver_user_id)
        .bind(message.status.as_str())
        .bind(message.created_at)
        .bind(message.acknowledged_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Get a message by id
pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> Result<Option<ChangeMessage>> {
    let row = sqlx::query("SELECT * FROM entity_changed_messages WHERE guid = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;

    row.map(message_from_row).transpose()
}

/// All pending messages for a receiver, oldest first
pub async fn pending_for_receiver(
    db: &SqlitePool,
    receiver_user_id: &str,
) -> Result<Vec<ChangeMessage>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM entity_changed_messages
        WHERE receiver_user_id = ? AND status = 'pending'
        ORDER BY created_at ASC
        "#,
    )
    .bind(receiver_user_id)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(message_from_row).collect()
}

/// Transition a message to acknowledged.
///
/// Idempotent: re-acknowledging refreshes acknowledged_at and leaves the
/// status unchanged.
pub async fn mark_acknowledged(
    db: &SqlitePool,
    id: Uuid,
    acknowledged_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE entity_changed_messages
        SET status = 'acknowledged', acknowledged_at = ?
        WHERE guid = ?
        "#,
    )
    .bind(acknowledged_at)
    .bind(id.to_string())
    .execute(db)
    .await?;

    Ok(())
}

fn message_from_row(row: SqliteRow) -> Result<ChangeMessage> {
    let id = parse_uuid(row.get::<String, _>("guid"))?;
    let entity_id = parse_uuid(row.get::<String, _>("entity_id"))?;

    let type_token: String = row.get("entity_type");
    let entity_type = EntityType::from_str(&type_token)
        .ok_or_else(|| Error::Internal(format!("unknown entity type: {type_token}")))?;

    let status_token: String = row.get("status");
    let status = MessageStatus::from_str(&status_token)
        .ok_or_else(|| Error::Internal(format!("unknown message status: {status_token}")))?;

    Ok(ChangeMessage {
        id,
        entity_id,
        entity_type,
        changed_by_user_id: row.get("changed_by_user_id"),
        receiver_user_id: row.get("receiver_user_id"),
        status,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        acknowledged_at: row.get::<Option<DateTime<Utc>>, _>("acknowledged_at"),
    })
}

fn parse_uuid(s: String) -> Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| Error::Internal(format!("corrupt uuid {s}: {e}")))
}
