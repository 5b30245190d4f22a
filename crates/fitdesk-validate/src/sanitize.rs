use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// Type-directed coercion applied after a field passes validation.
/// Every kind is total: bad input degrades to a safe value, never an
/// error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeKind {
    /// Numeric-prefix coercion truncated to integer: "42abc" -> 42.
    Int,
    /// Numeric-prefix coercion kept fractional: "3.5kg" -> 3.5.
    Float,
    /// Lowercased, trimmed, restricted to the RFC 5322 local/domain
    /// character set. Syntactic cleanup only, not deliverability.
    Email,
    /// Whitespace/control stripped, restricted to URL-safe characters.
    Url,
    /// Markup tags and control characters stripped.
    Text,
    /// Constrained markup subset allowed, everything else stripped.
    RichText,
    /// Element-wise recursive sanitize with the inner kind. A
    /// non-array value is wrapped as a single-element list.
    List(Box<SanitizeKind>),
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));
static RICH_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?([a-zA-Z0-9]+)[^>]*>").expect("rich tag regex"));
static EMAIL_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9.!#$%&'*+/=?^_`{|}~@+-]").expect("email strip regex"));
static URL_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9$\-_.+!*'(),%/?:@=&#~;\[\]]").expect("url strip regex"));
static NUM_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+-]?\d+(\.\d+)?").expect("numeric prefix regex"));

/// Tags the rich-text kind keeps. Formatting and list structure only;
/// no scripts, no styles, no media.
const RICH_ALLOWED: &[&str] = &[
    "a", "b", "blockquote", "br", "em", "i", "li", "ol", "p", "strong", "ul",
];

pub fn sanitize(value: &Value, kind: &SanitizeKind) -> Value {
    match kind {
        SanitizeKind::Int => json!(coerce_f64(value).trunc() as i64),
        SanitizeKind::Float => json!(coerce_f64(value)),
        SanitizeKind::Email => {
            let s = stringify(value).trim().to_lowercase();
            Value::String(EMAIL_STRIP_RE.replace_all(&s, "").into_owned())
        }
        SanitizeKind::Url => {
            let s = stringify(value);
            Value::String(URL_STRIP_RE.replace_all(s.trim(), "").into_owned())
        }
        SanitizeKind::Text => {
            let s = stringify(value);
            let no_tags = TAG_RE.replace_all(&s, "");
            Value::String(strip_control(no_tags.trim()))
        }
        SanitizeKind::RichText => {
            let s = stringify(value);
            let kept = RICH_TAG_RE.replace_all(&s, |caps: &regex::Captures<'_>| {
                let name = caps[1].to_lowercase();
                if RICH_ALLOWED.contains(&name.as_str()) {
                    caps[0].to_string()
                } else {
                    String::new()
                }
            });
            Value::String(strip_control(kept.trim()))
        }
        SanitizeKind::List(inner) => match value {
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| sanitize(v, inner)).collect())
            }
            other => Value::Array(vec![sanitize(other, inner)]),
        },
    }
}

/// Numeric-prefix coercion shared by Int and Float: numbers pass
/// through, strings contribute their leading numeric run, booleans map
/// to 0/1, anything else is 0.
fn coerce_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Value::String(s) => NUM_PREFIX_RE
            .find(s)
            .and_then(|m| m.as_str().trim().parse::<f64>().ok())
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn strip_control(s: &str) -> String {
    s.chars().filter(|c| !c.is_control() || *c == '\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_numeric_prefix_coercion() {
        assert_eq!(sanitize(&json!("42abc"), &SanitizeKind::Int), json!(42));
        assert_eq!(sanitize(&json!("-7.9kg"), &SanitizeKind::Int), json!(-7));
        assert_eq!(sanitize(&json!(3.7), &SanitizeKind::Int), json!(3));
        assert_eq!(sanitize(&json!("no digits"), &SanitizeKind::Int), json!(0));
        assert_eq!(sanitize(&Value::Null, &SanitizeKind::Int), json!(0));
    }

    #[test]
    fn float_keeps_fraction() {
        assert_eq!(sanitize(&json!("3.5 km"), &SanitizeKind::Float), json!(3.5));
        assert_eq!(sanitize(&json!(true), &SanitizeKind::Float), json!(1.0));
    }

    #[test]
    fn email_lowercases_and_strips() {
        assert_eq!(
            sanitize(&json!("  Coach@Example.COM \n"), &SanitizeKind::Email),
            json!("coach@example.com")
        );
        assert_eq!(
            sanitize(&json!("a b<>@ex.com"), &SanitizeKind::Email),
            json!("ab@ex.com")
        );
    }

    #[test]
    fn url_strips_whitespace_and_control() {
        assert_eq!(
            sanitize(&json!(" https://fit.example/plan?week=3 "), &SanitizeKind::Url),
            json!("https://fit.example/plan?week=3")
        );
    }

    #[test]
    fn text_strips_markup() {
        assert_eq!(
            sanitize(&json!("<b>5x5</b> squats\u{7}"), &SanitizeKind::Text),
            json!("5x5 squats")
        );
    }

    #[test]
    fn richtext_keeps_allowed_tags_only() {
        assert_eq!(
            sanitize(
                &json!("<p>ok</p><script>alert(1)</script><em>fine</em>"),
                &SanitizeKind::RichText
            ),
            json!("<p>ok</p>alert(1)<em>fine</em>")
        );
    }

    #[test]
    fn list_recurses_and_wraps_scalars() {
        assert_eq!(
            sanitize(
                &json!(["1a", "2b"]),
                &SanitizeKind::List(Box::new(SanitizeKind::Int))
            ),
            json!([1, 2])
        );
        assert_eq!(
            sanitize(&json!("9"), &SanitizeKind::List(Box::new(SanitizeKind::Int))),
            json!([9])
        );
    }
}
