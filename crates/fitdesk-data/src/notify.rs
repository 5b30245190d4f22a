/// Post-commit hook for new messages. The host wires push/email
/// delivery here; the data layer only guarantees the call happens
/// after the transaction committed.
pub trait Notifier: Send + Sync {
    fn message_sent(&self, conversation_id: i64, message_id: i64, recipient_id: i64, sender_id: i64);
}

pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn message_sent(
        &self,
        _conversation_id: i64,
        _message_id: i64,
        _recipient_id: i64,
        _sender_id: i64,
    ) {
    }
}
