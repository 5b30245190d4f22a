use crate::models::{ConversationListRow, ConversationRow, MessageRow, UserRow, WorkoutRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Users --

    pub fn create_user(&self, display_name: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (display_name) VALUES (?1)",
                [display_name],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, display_name, welcome_sent, created_at FROM users WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            display_name: row.get(1)?,
                            welcome_sent: row.get::<_, i64>(2)? != 0,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn user_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT id FROM users WHERE id = ?1", [id], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn welcome_sent(&self, user_id: i64) -> Result<Option<bool>> {
        self.with_conn(|conn| {
            let flag: Option<i64> = conn
                .query_row(
                    "SELECT welcome_sent FROM users WHERE id = ?1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(flag.map(|f| f != 0))
        })
    }

    pub fn set_welcome_sent(&self, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET welcome_sent = 1 WHERE id = ?1", [user_id])?;
            Ok(())
        })
    }

    // -- Conversations --

    /// Lookup by the exact stored `(recipient_id, initiator_id)` pair.
    /// A send in the reverse direction between the same two users does
    /// NOT match and opens a second conversation; see DESIGN.md.
    pub fn find_conversation(&self, recipient_id: i64, initiator_id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| find_conversation_id(conn, recipient_id, initiator_id))
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, recipient_id, initiator_id, created_at, updated_at
                     FROM conversations WHERE id = ?1",
                    [id],
                    |row| {
                        Ok(ConversationRow {
                            id: row.get(0)?,
                            recipient_id: row.get(1)?,
                            initiator_id: row.get(2)?,
                            created_at: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Inbox view for a recipient: newest activity first, joined with
    /// the counterpart's display name and per-thread unread tally.
    pub fn list_conversations(&self, user_id: i64) -> Result<Vec<ConversationListRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.initiator_id, u.display_name,
                        (SELECT COUNT(*) FROM messages m
                          WHERE m.conversation_id = c.id
                            AND m.sender_id != c.recipient_id
                            AND m.is_read = 0),
                        c.updated_at
                 FROM conversations c
                 LEFT JOIN users u ON c.initiator_id = u.id
                 WHERE c.recipient_id = ?1
                 ORDER BY c.updated_at DESC",
            )?;

            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(ConversationListRow {
                        id: row.get(0)?,
                        counterpart_id: row.get(1)?,
                        counterpart_name: row
                            .get::<_, Option<String>>(2)?
                            .unwrap_or_else(|| "unknown".to_string()),
                        unread_count: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Messages --

    pub fn list_messages(&self, conversation_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.sender_id, u.display_name,
                        m.content, m.is_read, m.created_at
                 FROM messages m
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE m.conversation_id = ?1
                 ORDER BY m.created_at ASC, m.id ASC",
            )?;

            let rows = stmt
                .query_map([conversation_id], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT m.id, m.conversation_id, m.sender_id, u.display_name,
                            m.content, m.is_read, m.created_at
                     FROM messages m
                     LEFT JOIN users u ON m.sender_id = u.id
                     WHERE m.id = ?1",
                    [id],
                    map_message_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let affected = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(affected > 0)
        })
    }

    /// Flip every message in the thread addressed to `user_id` (that
    /// is, not sent by them) to read. Returns the number flipped.
    pub fn mark_thread_read(&self, conversation_id: i64, user_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE conversation_id = ?1 AND sender_id != ?2 AND is_read = 0",
                [conversation_id, user_id],
            )?;
            Ok(affected)
        })
    }

    /// Unread messages across every conversation the user receives,
    /// excluding their own messages.
    pub fn unread_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*)
                 FROM messages m
                 JOIN conversations c ON m.conversation_id = c.id
                 WHERE c.recipient_id = ?1 AND m.sender_id != ?1 AND m.is_read = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Substring search over content, restricted to conversations the
    /// user participates in on either side.
    pub fn search_messages(&self, user_id: i64, query: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.conversation_id, m.sender_id, u.display_name,
                        m.content, m.is_read, m.created_at
                 FROM messages m
                 JOIN conversations c ON m.conversation_id = c.id
                 LEFT JOIN users u ON m.sender_id = u.id
                 WHERE (c.recipient_id = ?1 OR c.initiator_id = ?1)
                   AND m.content LIKE ?2 ESCAPE '\\'
                 ORDER BY m.created_at DESC, m.id DESC",
            )?;

            let pattern = format!("%{}%", escape_like(query));
            let rows = stmt
                .query_map(rusqlite::params![user_id, pattern], map_message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    // -- Workouts --

    pub fn insert_workout(
        &self,
        user_id: i64,
        title: &str,
        duration_min: i64,
        intensity: i64,
        notes: Option<&str>,
        logged_on: &str,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO workouts (user_id, title, duration_min, intensity, notes, logged_on, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))",
                rusqlite::params![user_id, title, duration_min, intensity, notes, logged_on],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_workout(&self, id: i64) -> Result<Option<WorkoutRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, user_id, title, duration_min, intensity, notes, logged_on, created_at
                     FROM workouts WHERE id = ?1",
                    [id],
                    map_workout_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn list_workouts(&self, user_id: i64, logged_on: &str) -> Result<Vec<WorkoutRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, duration_min, intensity, notes, logged_on, created_at
                 FROM workouts
                 WHERE user_id = ?1 AND logged_on = ?2
                 ORDER BY id ASC",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, logged_on], map_workout_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

pub(crate) fn find_conversation_id(
    conn: &Connection,
    recipient_id: i64,
    initiator_id: i64,
) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM conversations WHERE recipient_id = ?1 AND initiator_id = ?2",
            [recipient_id, initiator_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        sender_name: row
            .get::<_, Option<String>>(3)?
            .unwrap_or_else(|| "unknown".to_string()),
        content: row.get(4)?,
        is_read: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
    })
}

fn map_workout_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkoutRow> {
    Ok(WorkoutRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        duration_min: row.get(3)?,
        intensity: row.get(4)?,
        notes: row.get(5)?,
        logged_on: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Escape LIKE metacharacters so user input matches literally.
fn escape_like(q: &str) -> String {
    q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_done"), "50\\%\\_done");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
    }

    #[test]
    fn user_roundtrip_and_welcome_flag() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_user("Alex").unwrap();

        let user = db.get_user(id).unwrap().unwrap();
        assert_eq!(user.display_name, "Alex");
        assert!(!user.welcome_sent);

        assert_eq!(db.welcome_sent(id).unwrap(), Some(false));
        db.set_welcome_sent(id).unwrap();
        assert_eq!(db.welcome_sent(id).unwrap(), Some(true));

        assert_eq!(db.welcome_sent(9999).unwrap(), None);
        assert!(!db.user_exists(9999).unwrap());
    }

    #[test]
    fn conversation_lookup_is_direction_sensitive() {
        let db = Database::open_in_memory().unwrap();
        let a = db.create_user("A").unwrap();
        let b = db.create_user("B").unwrap();

        let now = chrono::Utc::now();
        db.send_message(a, b, "hi", now).unwrap();

        assert!(db.find_conversation(a, b).unwrap().is_some());
        // Reverse order is a different pair by design.
        assert!(db.find_conversation(b, a).unwrap().is_none());
    }

    #[test]
    fn workouts_list_by_day() {
        let db = Database::open_in_memory().unwrap();
        let u = db.create_user("Alex").unwrap();

        db.insert_workout(u, "Morning run", 30, 6, None, "2026-08-30")
            .unwrap();
        db.insert_workout(u, "Lifting", 45, 8, Some("felt strong"), "2026-08-30")
            .unwrap();
        db.insert_workout(u, "Yoga", 20, 3, None, "2026-08-29").unwrap();

        let today = db.list_workouts(u, "2026-08-30").unwrap();
        assert_eq!(today.len(), 2);
        assert_eq!(today[0].title, "Morning run");
        assert_eq!(today[1].notes.as_deref(), Some("felt strong"));
    }
}
