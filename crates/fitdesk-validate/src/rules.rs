use crate::sanitize::SanitizeKind;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// Custom per-field check. Returns the (possibly transformed) value,
/// or a message that gets scoped to the field by the engine.
pub type Validator = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// JSON number, or a string that parses as one.
    Number,
    /// `true`, `false`, `"0"` or `"1"`.
    Boolean,
    /// JSON array.
    Array,
}

/// Declarative rule set for one field. Built with the chained setters;
/// every check is optional, checks run in the engine's fixed order.
#[derive(Clone, Default)]
pub struct Rule {
    pub(crate) required: bool,
    pub(crate) field_type: Option<FieldType>,
    pub(crate) min: Option<f64>,
    pub(crate) max: Option<f64>,
    pub(crate) min_length: Option<usize>,
    pub(crate) max_length: Option<usize>,
    pub(crate) pattern: Option<Regex>,
    pub(crate) validator: Option<Validator>,
    pub(crate) sanitize: Option<SanitizeKind>,
}

impl Rule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn field_type(mut self, t: FieldType) -> Self {
        self.field_type = Some(t);
        self
    }

    pub fn min(mut self, v: f64) -> Self {
        self.min = Some(v);
        self
    }

    pub fn max(mut self, v: f64) -> Self {
        self.max = Some(v);
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.max_length = Some(n);
        self
    }

    /// `Regex` is refcounted internally, so call sites keep theirs in
    /// a `once_cell::sync::Lazy` and clone it in.
    pub fn pattern(mut self, re: Regex) -> Self {
        self.pattern = Some(re);
        self
    }

    pub fn validator<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(f));
        self
    }

    pub fn sanitize(mut self, kind: SanitizeKind) -> Self {
        self.sanitize = Some(kind);
        self
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("required", &self.required)
            .field("field_type", &self.field_type)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("pattern", &self.pattern.as_ref().map(Regex::as_str))
            .field("has_validator", &self.validator.is_some())
            .field("sanitize", &self.sanitize)
            .finish()
    }
}

/// Ordered field → rule mapping. Order matters: errors come back in
/// declaration order so callers can report them stably.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub(crate) fields: Vec<(String, Rule)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, rule: Rule) -> Self {
        self.fields.push((name.to_string(), rule));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
