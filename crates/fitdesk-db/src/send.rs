use crate::queries::find_conversation_id;
use crate::Database;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::TransactionBehavior;
use tracing::debug;

#[derive(Debug)]
pub struct SendOutcome {
    pub conversation_id: i64,
    pub message_id: i64,
    /// True when this send created the conversation row.
    pub conversation_created: bool,
}

impl Database {
    /// Atomic send: get-or-create the conversation for the exact
    /// `(recipient_id, sender_id)` pair, insert the message, bump
    /// `updated_at`, commit. Any failing step drops the transaction,
    /// which rolls back everything including a conversation row
    /// created in the same call.
    ///
    /// `now` is supplied by the caller so the conversation's
    /// `updated_at` lands exactly equal to the message's `created_at`.
    ///
    /// Two concurrent first sends for the same new pair can both pass
    /// the existence check and commit two conversation rows; the
    /// sequential path always reuses the one row. See DESIGN.md.
    pub fn send_message(
        &self,
        recipient_id: i64,
        sender_id: i64,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<SendOutcome> {
        let stamp = now.to_rfc3339_opts(SecondsFormat::Micros, true);

        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let existing = find_conversation_id(&tx, recipient_id, sender_id)?;
            let (conversation_id, conversation_created) = match existing {
                Some(id) => (id, false),
                None => {
                    tx.execute(
                        "INSERT INTO conversations (recipient_id, initiator_id, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?3)",
                        rusqlite::params![recipient_id, sender_id, stamp],
                    )
                    .context("creating conversation")?;
                    (tx.last_insert_rowid(), true)
                }
            };

            tx.execute(
                "INSERT INTO messages (conversation_id, sender_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![conversation_id, sender_id, content, stamp],
            )
            .context("inserting message")?;
            let message_id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                rusqlite::params![stamp, conversation_id],
            )
            .context("touching conversation")?;

            tx.commit()?;

            debug!(
                conversation_id,
                message_id, conversation_created, "message committed"
            );

            Ok(SendOutcome {
                conversation_id,
                message_id,
                conversation_created,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn conversation_count(db: &Database, recipient: i64, initiator: i64) -> i64 {
        db.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM conversations WHERE recipient_id = ?1 AND initiator_id = ?2",
                [recipient, initiator],
                |row| row.get(0),
            )?;
            Ok(n)
        })
        .unwrap()
    }

    #[test]
    fn first_send_creates_conversation_with_matching_timestamps() {
        let db = Database::open_in_memory().unwrap();
        let recipient = db.create_user("Riley").unwrap();
        let sender = db.create_user("Morgan").unwrap();

        let now = Utc::now();
        let out = db.send_message(recipient, sender, "hello", now).unwrap();
        assert!(out.conversation_created);

        let messages = db.list_messages(out.conversation_id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_id, sender);
        assert_eq!(messages[0].content, "hello");

        let inbox = db.list_conversations(recipient).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, out.conversation_id);
        assert_eq!(inbox[0].counterpart_id, sender);
        assert_eq!(inbox[0].updated_at, messages[0].created_at);
    }

    #[test]
    fn sequential_sends_reuse_one_conversation() {
        let db = Database::open_in_memory().unwrap();
        let recipient = db.create_user("Riley").unwrap();
        let sender = db.create_user("Morgan").unwrap();

        let first = db
            .send_message(recipient, sender, "one", Utc::now())
            .unwrap();
        let second = db
            .send_message(recipient, sender, "two", Utc::now())
            .unwrap();

        assert_eq!(first.conversation_id, second.conversation_id);
        assert!(!second.conversation_created);
        assert_eq!(conversation_count(&db, recipient, sender), 1);
        assert_eq!(db.list_messages(first.conversation_id).unwrap().len(), 2);
    }

    #[test]
    fn failed_message_insert_rolls_back_conversation() {
        let db = Database::open_in_memory().unwrap();
        let recipient = db.create_user("Riley").unwrap();
        let sender = db.create_user("Morgan").unwrap();

        // Empty content violates the messages CHECK constraint, which
        // fires after the conversation insert already succeeded inside
        // the transaction.
        let err = db
            .send_message(recipient, sender, "", Utc::now())
            .unwrap_err();
        assert!(format!("{err:#}").contains("inserting message"));

        assert_eq!(conversation_count(&db, recipient, sender), 0);
    }

    #[test]
    fn updated_at_tracks_newest_message() {
        let db = Database::open_in_memory().unwrap();
        let recipient = db.create_user("Riley").unwrap();
        let sender = db.create_user("Morgan").unwrap();

        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(90);
        db.send_message(recipient, sender, "one", t1).unwrap();
        let out = db.send_message(recipient, sender, "two", t2).unwrap();

        let conv = db.get_conversation(out.conversation_id).unwrap().unwrap();
        let messages = db.list_messages(out.conversation_id).unwrap();
        assert_eq!(conv.updated_at, messages[1].created_at);
        assert!(conv.created_at < conv.updated_at);
    }

    #[test]
    fn unread_counting_and_mark_read() {
        let db = Database::open_in_memory().unwrap();
        let u = db.create_user("U").unwrap();
        let coach = db.create_user("Coach").unwrap();

        let out = db.send_message(u, coach, "warmup plan", Utc::now()).unwrap();
        db.mark_thread_read(out.conversation_id, u).unwrap();

        db.send_message(u, coach, "main set", Utc::now()).unwrap();
        db.send_message(u, coach, "cooldown", Utc::now()).unwrap();

        // Three messages to U, two still unread.
        assert_eq!(db.unread_count(u).unwrap(), 2);

        let flipped = db.mark_thread_read(out.conversation_id, u).unwrap();
        assert_eq!(flipped, 2);
        assert_eq!(db.unread_count(u).unwrap(), 0);
    }

    #[test]
    fn own_replies_do_not_count_as_unread() {
        let db = Database::open_in_memory().unwrap();
        let u = db.create_user("U").unwrap();
        let coach = db.create_user("Coach").unwrap();

        let out = db.send_message(u, coach, "plan", Utc::now()).unwrap();
        // U's own message sitting in the thread addressed to them.
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (conversation_id, sender_id, content, created_at)
                 VALUES (?1, ?2, 'thanks', datetime('now'))",
                [out.conversation_id, u],
            )?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.unread_count(u).unwrap(), 1);
    }

    #[test]
    fn search_is_scoped_to_participants() {
        let db = Database::open_in_memory().unwrap();
        let u = db.create_user("U").unwrap();
        let coach = db.create_user("Coach").unwrap();
        let other = db.create_user("Other").unwrap();

        db.send_message(u, coach, "interval session at 6pm", Utc::now())
            .unwrap();
        db.send_message(other, coach, "interval session at 7pm", Utc::now())
            .unwrap();

        let hits = db.search_messages(u, "interval").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "interval session at 6pm");

        // LIKE wildcards in the query match literally.
        assert!(db.search_messages(u, "100%").unwrap().is_empty());
    }
}
