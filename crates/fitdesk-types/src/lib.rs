pub mod error;
pub mod models;

pub use error::{DataError, DataResult, FieldError, ValidationErrors};
pub use models::{
    Conversation, ConversationSummary, Message, MessageView, UserId, Workout, WorkoutSummary,
};
