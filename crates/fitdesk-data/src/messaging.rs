use crate::manager::{DataManager, ManagerContext};
use crate::notify::Notifier;
use chrono::Utc;
use fitdesk_db::models::{parse_timestamp, ConversationListRow, MessageRow};
use fitdesk_types::{
    Conversation, ConversationSummary, DataError, DataResult, Message, MessageView,
    ValidationErrors,
};
use fitdesk_validate::{FieldType, Rule, SanitizeKind, Schema};
use serde_json::{json, Map, Value};
use std::sync::Arc;

pub const CAP_SEND_MESSAGES: &str = "send_messages";
pub const CAP_DELETE_MESSAGES: &str = "delete_messages";

/// Conversation and message operations. Writes go straight to the
/// database transaction path; the shared cache only serves the
/// read-heavy aggregate views (inbox list, unread count), keyed
/// per-user, and every write invalidates the keys it affects.
pub struct MessagingManager {
    ctx: ManagerContext,
    notifier: Arc<dyn Notifier>,
}

impl DataManager for MessagingManager {
    fn cache_group(&self) -> &'static str {
        "messaging"
    }

    fn context(&self) -> &ManagerContext {
        &self.ctx
    }
}

fn send_schema() -> Schema {
    Schema::new()
        .field(
            "recipient_id",
            Rule::new()
                .required()
                .field_type(FieldType::Number)
                .min(1.0)
                .sanitize(SanitizeKind::Int),
        )
        .field(
            "sender_id",
            Rule::new()
                .required()
                .field_type(FieldType::Number)
                .min(1.0)
                .sanitize(SanitizeKind::Int),
        )
        .field(
            "content",
            Rule::new()
                .required()
                .max_length(4000)
                .validator(|v| {
                    let s = v.as_str().unwrap_or_default();
                    if s.trim().is_empty() {
                        Err("must not be empty".to_string())
                    } else {
                        Ok(v.clone())
                    }
                })
                .sanitize(SanitizeKind::Text),
        )
}

impl MessagingManager {
    pub fn new(ctx: ManagerContext, notifier: Arc<dyn Notifier>) -> Self {
        Self { ctx, notifier }
    }

    /// Validate, authorize, then run the atomic send. Returns the id
    /// of the (possibly new) conversation. The notifier fires only
    /// after the transaction committed.
    pub fn send_message(
        &self,
        recipient_id: i64,
        sender_id: i64,
        content: &str,
    ) -> DataResult<i64> {
        let mut input = Map::new();
        input.insert("recipient_id".to_string(), json!(recipient_id));
        input.insert("sender_id".to_string(), json!(sender_id));
        input.insert("content".to_string(), json!(content));

        let clean = self.validate(&input, &send_schema())?;
        let recipient = clean["recipient_id"].as_i64().unwrap_or_default();
        let sender = clean["sender_id"].as_i64().unwrap_or_default();
        let content = value_str(&clean["content"]);

        self.require(CAP_SEND_MESSAGES, None)?;
        self.check_users_exist(recipient, sender)?;

        let outcome = self
            .ctx
            .db
            .send_message(recipient, sender, &content, Utc::now())
            .map_err(|e| {
                self.log_error(&format!("{e:#}"), "send_message");
                DataError::Storage(format!("{e:#}"))
            })?;

        self.invalidate(&format!("inbox:{recipient}"));
        self.invalidate(&format!("unread:{recipient}"));

        self.notifier
            .message_sent(outcome.conversation_id, outcome.message_id, recipient, sender);

        Ok(outcome.conversation_id)
    }

    /// One-time welcome from the configured system sender. The flag
    /// check and the send are separate operations: two concurrent
    /// first contacts can both pass the check and double-send. Known
    /// narrow race, kept as-is; see DESIGN.md.
    ///
    /// System-initiated, so it bypasses the session capability check.
    pub fn send_welcome_if_needed(&self, user_id: i64) -> DataResult<Option<i64>> {
        let already = self
            .ctx
            .db
            .welcome_sent(user_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?
            .ok_or_else(|| DataError::not_found("user", user_id))?;
        if already {
            return Ok(None);
        }

        let sender = self.ctx.config.welcome_sender_id;
        let text = self.ctx.config.welcome_message.clone();
        let outcome = self
            .ctx
            .db
            .send_message(user_id, sender, &text, Utc::now())
            .map_err(|e| {
                self.log_error(&format!("{e:#}"), "send_welcome");
                DataError::Storage(format!("{e:#}"))
            })?;

        self.ctx
            .db
            .set_welcome_sent(user_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?;

        self.invalidate(&format!("inbox:{user_id}"));
        self.invalidate(&format!("unread:{user_id}"));

        self.notifier
            .message_sent(outcome.conversation_id, outcome.message_id, user_id, sender);

        Ok(Some(outcome.conversation_id))
    }

    pub fn get_conversation(&self, conversation_id: i64) -> DataResult<Conversation> {
        let row = self
            .ctx
            .db
            .get_conversation(conversation_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?
            .ok_or_else(|| DataError::not_found("conversation", conversation_id))?;

        Ok(Conversation {
            id: row.id,
            recipient_id: row.recipient_id,
            initiator_id: row.initiator_id,
            created_at: parse_timestamp(&row.created_at),
            updated_at: parse_timestamp(&row.updated_at),
        })
    }

    pub fn get_message(&self, message_id: i64) -> DataResult<Message> {
        let row = self
            .ctx
            .db
            .get_message(message_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?
            .ok_or_else(|| DataError::not_found("message", message_id))?;

        Ok(Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            content: row.content,
            is_read: row.is_read,
            created_at: parse_timestamp(&row.created_at),
        })
    }

    /// Inbox for a recipient, newest activity first. Served through
    /// the per-user cache key.
    pub fn list_conversations(&self, user_id: i64) -> DataResult<Vec<ConversationSummary>> {
        let ttl = self.ctx.config.cache_ttl;
        self.cached_read(&format!("inbox:{user_id}"), ttl, || {
            let rows = self
                .ctx
                .db
                .list_conversations(user_id)
                .map_err(|e| DataError::Storage(format!("{e:#}")))?;
            Ok(rows.into_iter().map(summary_from).collect())
        })
    }

    /// Full thread, oldest first. Uncached: thread views must reflect
    /// the transaction that just committed.
    pub fn list_messages(&self, conversation_id: i64) -> DataResult<Vec<MessageView>> {
        self.ctx
            .db
            .get_conversation(conversation_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?
            .ok_or_else(|| DataError::not_found("conversation", conversation_id))?;

        let rows = self
            .ctx
            .db
            .list_messages(conversation_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?;
        Ok(rows.into_iter().map(view_from).collect())
    }

    pub fn mark_thread_read(&self, conversation_id: i64, user_id: i64) -> DataResult<usize> {
        self.ctx
            .db
            .get_conversation(conversation_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?
            .ok_or_else(|| DataError::not_found("conversation", conversation_id))?;

        let flipped = self
            .ctx
            .db
            .mark_thread_read(conversation_id, user_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?;

        self.invalidate(&format!("inbox:{user_id}"));
        self.invalidate(&format!("unread:{user_id}"));
        Ok(flipped)
    }

    pub fn get_unread_count(&self, user_id: i64) -> DataResult<i64> {
        let ttl = self.ctx.config.cache_ttl;
        self.cached_read(&format!("unread:{user_id}"), ttl, || {
            self.ctx
                .db
                .unread_count(user_id)
                .map_err(|e| DataError::Storage(format!("{e:#}")))
        })
    }

    /// Substring search over the user's own conversations, both sides.
    /// A blank query matches nothing.
    pub fn search_messages(&self, user_id: i64, query: &str) -> DataResult<Vec<MessageView>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .ctx
            .db
            .search_messages(user_id, query)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?;
        Ok(rows.into_iter().map(view_from).collect())
    }

    /// Sender-only delete. Unread tallies and inbox previews across
    /// the group may depend on the deleted row, so the whole group is
    /// cleared rather than chasing individual keys.
    pub fn delete_message(&self, message_id: i64, user_id: i64) -> DataResult<()> {
        let row = self
            .ctx
            .db
            .get_message(message_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?
            .ok_or_else(|| DataError::not_found("message", message_id))?;

        if row.sender_id != user_id {
            return Err(DataError::Authorization {
                capability: CAP_DELETE_MESSAGES.to_string(),
            });
        }
        self.require(CAP_DELETE_MESSAGES, Some(message_id))?;

        self.ctx
            .db
            .delete_message(message_id)
            .map_err(|e| DataError::Storage(format!("{e:#}")))?;

        self.invalidate_all();
        Ok(())
    }

    /// Both parties must exist before the transaction is attempted.
    fn check_users_exist(&self, recipient: i64, sender: i64) -> DataResult<()> {
        let mut errors = ValidationErrors::default();
        for (field, id) in [("recipient_id", recipient), ("sender_id", sender)] {
            let exists = self
                .ctx
                .db
                .user_exists(id)
                .map_err(|e| DataError::Storage(format!("{e:#}")))?;
            if !exists {
                errors.push(field, format!("user {id} does not exist"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DataError::Validation(errors))
        }
    }
}

fn summary_from(row: ConversationListRow) -> ConversationSummary {
    ConversationSummary {
        id: row.id,
        counterpart_id: row.counterpart_id,
        counterpart_name: row.counterpart_name,
        unread_count: row.unread_count,
        updated_at: parse_timestamp(&row.updated_at),
    }
}

fn view_from(row: MessageRow) -> MessageView {
    MessageView {
        id: row.id,
        conversation_id: row.conversation_id,
        sender_id: row.sender_id,
        sender_name: row.sender_name,
        content: row.content,
        is_read: row.is_read,
        created_at: parse_timestamp(&row.created_at),
    }
}

fn value_str(v: &Value) -> String {
    v.as_str().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AllowAll, Authorizer, DenyAll, Session};
    use crate::config::Config;
    use crate::notify::NoopNotifier;
    use fitdesk_cache::Cache;
    use fitdesk_db::Database;
    use std::sync::Mutex;

    struct RecordingNotifier {
        calls: Mutex<Vec<(i64, i64, i64, i64)>>,
    }

    impl Notifier for RecordingNotifier {
        fn message_sent(
            &self,
            conversation_id: i64,
            message_id: i64,
            recipient_id: i64,
            sender_id: i64,
        ) {
            self.calls
                .lock()
                .unwrap()
                .push((conversation_id, message_id, recipient_id, sender_id));
        }
    }

    fn context(db: Arc<Database>, authorizer: Arc<dyn Authorizer>, user: i64) -> ManagerContext {
        ManagerContext {
            db,
            cache: Cache::in_memory(),
            authorizer,
            session: Some(Session { user_id: user }),
            config: Config::default(),
        }
    }

    /// Seeds the fixed system sender (id 1 per default config) plus a
    /// recipient and a sender, in that order.
    fn seeded_db() -> (Arc<Database>, i64, i64) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("fitdesk=debug")
            .try_init();
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.create_user("Fitdesk Team").unwrap();
        let recipient = db.create_user("Riley").unwrap();
        let sender = db.create_user("Morgan").unwrap();
        (db, recipient, sender)
    }

    fn manager(db: Arc<Database>, user: i64) -> MessagingManager {
        MessagingManager::new(context(db, Arc::new(AllowAll), user), Arc::new(NoopNotifier))
    }

    #[test]
    fn first_send_scenario() {
        let (db, recipient, sender) = seeded_db();
        let m = manager(db, sender);

        let cid = m.send_message(recipient, sender, "hello").unwrap();

        let thread = m.list_messages(cid).unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].sender_id, sender);
        assert_eq!(thread[0].sender_name, "Morgan");
        assert_eq!(thread[0].content, "hello");

        let inbox = m.list_conversations(recipient).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, cid);
        assert_eq!(inbox[0].updated_at, thread[0].created_at);
    }

    #[test]
    fn rejects_empty_content_and_unknown_users_before_storage() {
        let (db, recipient, sender) = seeded_db();
        let m = manager(db.clone(), sender);

        let err = m.send_message(recipient, sender, "   ").unwrap_err();
        match err {
            DataError::Validation(errs) => {
                assert_eq!(errs.0[0].field, "content");
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let err = m.send_message(9999, sender, "hi").unwrap_err();
        match err {
            DataError::Validation(errs) => {
                assert_eq!(errs.0[0].field, "recipient_id");
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        // Nothing was written on either path.
        assert!(db.find_conversation(recipient, sender).unwrap().is_none());
        assert!(db.find_conversation(9999, sender).unwrap().is_none());
    }

    #[test]
    fn denied_capability_performs_nothing() {
        let (db, recipient, sender) = seeded_db();
        let m = MessagingManager::new(
            context(db.clone(), Arc::new(DenyAll), sender),
            Arc::new(NoopNotifier),
        );

        let err = m.send_message(recipient, sender, "hi").unwrap_err();
        assert!(matches!(err, DataError::Authorization { .. }));
        assert!(db.find_conversation(recipient, sender).unwrap().is_none());
    }

    #[test]
    fn markup_is_stripped_from_content() {
        let (db, recipient, sender) = seeded_db();
        let m = manager(db, sender);

        let cid = m
            .send_message(recipient, sender, "<b>new</b> plan attached")
            .unwrap();
        let thread = m.list_messages(cid).unwrap();
        assert_eq!(thread[0].content, "new plan attached");
    }

    #[test]
    fn notifier_fires_after_successful_send_only() {
        let (db, recipient, sender) = seeded_db();
        let notifier = Arc::new(RecordingNotifier {
            calls: Mutex::new(Vec::new()),
        });
        let m = MessagingManager::new(
            context(db, Arc::new(AllowAll), sender),
            notifier.clone(),
        );

        m.send_message(recipient, sender, "hello").unwrap();
        assert_eq!(notifier.calls.lock().unwrap().len(), 1);

        let _ = m.send_message(recipient, sender, "  ").unwrap_err();
        assert_eq!(notifier.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn unread_count_refreshes_after_send_and_mark_read() {
        let (db, recipient, sender) = seeded_db();
        let m = manager(db, sender);

        // Prime the cache at zero.
        assert_eq!(m.get_unread_count(recipient).unwrap(), 0);

        let cid = m.send_message(recipient, sender, "one").unwrap();
        m.send_message(recipient, sender, "two").unwrap();
        // The send invalidated the recipient's unread key, so this is
        // a fresh read, not the cached zero.
        assert_eq!(m.get_unread_count(recipient).unwrap(), 2);

        m.mark_thread_read(cid, recipient).unwrap();
        assert_eq!(m.get_unread_count(recipient).unwrap(), 0);
    }

    #[test]
    fn inbox_cache_is_invalidated_by_sends() {
        let (db, recipient, sender) = seeded_db();
        let m = manager(db, sender);

        assert!(m.list_conversations(recipient).unwrap().is_empty());
        let cid = m.send_message(recipient, sender, "hello").unwrap();

        let inbox = m.list_conversations(recipient).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].id, cid);
        assert_eq!(inbox[0].unread_count, 1);
    }

    #[test]
    fn welcome_is_sent_exactly_once() {
        let (db, recipient, _) = seeded_db();
        let m = manager(db.clone(), recipient);

        let first = m.send_welcome_if_needed(recipient).unwrap();
        let cid = first.expect("first call sends");

        let second = m.send_welcome_if_needed(recipient).unwrap();
        assert_eq!(second, None);

        let thread = m.list_messages(cid).unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].sender_id, 1);
        assert!(thread[0].content.starts_with("Welcome"));

        assert!(matches!(
            m.send_welcome_if_needed(9999).unwrap_err(),
            DataError::NotFound { .. }
        ));
    }

    #[test]
    fn second_send_reuses_the_conversation() {
        let (db, recipient, sender) = seeded_db();
        let m = manager(db, sender);

        let first = m.send_message(recipient, sender, "one").unwrap();
        let second = m.send_message(recipient, sender, "two").unwrap();
        assert_eq!(first, second);
        assert_eq!(m.list_messages(first).unwrap().len(), 2);
    }

    #[test]
    fn single_row_accessors_resolve_or_not_found() {
        let (db, recipient, sender) = seeded_db();
        let m = manager(db, sender);

        let cid = m.send_message(recipient, sender, "hello").unwrap();
        let conv = m.get_conversation(cid).unwrap();
        assert_eq!(conv.recipient_id, recipient);
        assert_eq!(conv.initiator_id, sender);
        assert_eq!(conv.updated_at, conv.created_at);

        let message_id = m.list_messages(cid).unwrap()[0].id;
        let msg = m.get_message(message_id).unwrap();
        assert_eq!(msg.conversation_id, cid);
        assert!(!msg.is_read);
        assert_eq!(msg.created_at, conv.updated_at);

        assert!(matches!(
            m.get_message(9999).unwrap_err(),
            DataError::NotFound { entity: "message", .. }
        ));
    }

    #[test]
    fn list_messages_unknown_conversation_is_not_found() {
        let (db, _, sender) = seeded_db();
        let m = manager(db, sender);
        assert!(matches!(
            m.list_messages(42).unwrap_err(),
            DataError::NotFound {
                entity: "conversation",
                ..
            }
        ));
    }

    #[test]
    fn search_scopes_and_trims() {
        let (db, recipient, sender) = seeded_db();
        let m = manager(db, sender);

        m.send_message(recipient, sender, "tempo run on Tuesday").unwrap();

        let hits = m.search_messages(recipient, " tempo ").unwrap();
        assert_eq!(hits.len(), 1);
        assert!(m.search_messages(recipient, "   ").unwrap().is_empty());
    }

    #[test]
    fn delete_is_sender_only() {
        let (db, recipient, sender) = seeded_db();
        let m = manager(db, sender);

        let cid = m.send_message(recipient, sender, "oops").unwrap();
        let message_id = m.list_messages(cid).unwrap()[0].id;

        let err = m.delete_message(message_id, recipient).unwrap_err();
        assert!(matches!(err, DataError::Authorization { .. }));

        m.delete_message(message_id, sender).unwrap();
        assert!(m.list_messages(cid).unwrap().is_empty());

        assert!(matches!(
            m.delete_message(message_id, sender).unwrap_err(),
            DataError::NotFound { .. }
        ));
    }
}
