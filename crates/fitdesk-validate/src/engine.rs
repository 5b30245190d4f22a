use crate::rules::{FieldType, Rule, Schema};
use crate::sanitize::sanitize;
use fitdesk_types::ValidationErrors;
use serde_json::{Map, Value};

/// Evaluate `input` against `schema`, producing either a fully
/// sanitized value map or every field-scoped error found. Fields run
/// in declaration order and a failing field never aborts the rest, so
/// callers can report all problems at once.
pub fn validate(
    input: &Map<String, Value>,
    schema: &Schema,
) -> Result<Map<String, Value>, ValidationErrors> {
    let mut output = Map::new();
    let mut errors = ValidationErrors::default();

    for (name, rule) in &schema.fields {
        let Some(value) = input.get(name) else {
            if rule.required {
                errors.push(name, "is required");
            }
            continue;
        };

        match check_field(value, rule) {
            Ok(checked) => {
                let out = match &rule.sanitize {
                    Some(kind) => sanitize(&checked, kind),
                    None => checked,
                };
                output.insert(name.clone(), out);
            }
            Err(msg) => errors.push(name, msg),
        }
    }

    if errors.is_empty() {
        Ok(output)
    } else {
        Err(errors)
    }
}

/// Run the per-field pipeline: type, range, length, pattern, custom.
/// Returns the value to carry forward (the custom validator may
/// transform it) or the first failing check's message.
fn check_field(value: &Value, rule: &Rule) -> Result<Value, String> {
    if let Some(t) = rule.field_type {
        check_type(value, t)?;
    }

    // Range applies only when the value is numeric.
    if let Some(n) = as_number(value) {
        if let Some(min) = rule.min {
            if n < min {
                return Err(format!("must be at least {min}"));
            }
        }
        if let Some(max) = rule.max {
            if n > max {
                return Err(format!("must be at most {max}"));
            }
        }
    }

    // Length applies only when the value is a string.
    if let Value::String(s) = value {
        let len = s.chars().count();
        if let Some(min) = rule.min_length {
            if len < min {
                return Err(format!("must be at least {min} characters"));
            }
        }
        if let Some(max) = rule.max_length {
            if len > max {
                return Err(format!("must be at most {max} characters"));
            }
        }
        if let Some(re) = &rule.pattern {
            if !re.is_match(s) {
                return Err("has an invalid format".to_string());
            }
        }
    }

    match &rule.validator {
        Some(f) => f(value),
        None => Ok(value.clone()),
    }
}

fn check_type(value: &Value, t: FieldType) -> Result<(), String> {
    let ok = match t {
        FieldType::Number => as_number(value).is_some(),
        FieldType::Boolean => match value {
            Value::Bool(_) => true,
            Value::String(s) => s == "0" || s == "1",
            _ => false,
        },
        FieldType::Array => value.is_array(),
    };
    if ok {
        Ok(())
    } else {
        Err(format!("must be a {}", type_name(t)))
    }
}

fn type_name(t: FieldType) -> &'static str {
    match t {
        FieldType::Number => "number",
        FieldType::Boolean => "boolean",
        FieldType::Array => "list",
    }
}

/// Numeric view of a value: JSON numbers directly, strings only when
/// the whole trimmed string parses.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
