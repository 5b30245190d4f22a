pub mod engine;
pub mod rules;
pub mod sanitize;

pub use engine::validate;
pub use rules::{FieldType, Rule, Schema};
pub use sanitize::{sanitize, SanitizeKind};
