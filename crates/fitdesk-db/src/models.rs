/// Database row types — these map directly to SQLite rows.
/// Distinct from fitdesk-types API models to keep the DB layer
/// independent.
use chrono::{DateTime, Utc};
use tracing::warn;

pub struct UserRow {
    pub id: i64,
    pub display_name: String,
    pub welcome_sent: bool,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: i64,
    pub recipient_id: i64,
    pub initiator_id: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// One inbox entry: a conversation joined with the counterpart's
/// display name and its unread tally.
pub struct ConversationListRow {
    pub id: i64,
    pub counterpart_id: i64,
    pub counterpart_name: String,
    pub unread_count: i64,
    pub updated_at: String,
}

/// A message joined with its sender's display name.
pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

pub struct WorkoutRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub duration_min: i64,
    pub intensity: i64,
    pub notes: Option<String>,
    pub logged_on: String,
    pub created_at: String,
}

/// Timestamps are written from Rust as RFC 3339, but column defaults
/// use SQLite's naive `datetime('now')` format, so accept both.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
