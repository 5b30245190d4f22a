use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Member ids are SQLite integer rowids. Kept as a plain alias rather
/// than a newtype so they compose with rusqlite params without glue.
pub type UserId = i64;

/// A durable pairing of two participants under which messages
/// accumulate. Created lazily on first send, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub recipient_id: UserId,
    pub initiator_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Bumped to the newest message's created_at on every send.
    pub updated_at: DateTime<Utc>,
}

/// One conversation as shown in a user's inbox list: the conversation
/// row joined with the counterpart's display name and unread tally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub counterpart_id: UserId,
    pub counterpart_name: String,
    pub unread_count: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: UserId,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A message joined with its sender's display name, for thread display
/// and search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: UserId,
    pub sender_name: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub duration_min: i64,
    pub intensity: i64,
    pub notes: Option<String>,
    /// Calendar day the workout belongs to, as YYYY-MM-DD.
    pub logged_on: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub id: i64,
    pub title: String,
    pub duration_min: i64,
    pub intensity: i64,
    pub logged_on: String,
}
