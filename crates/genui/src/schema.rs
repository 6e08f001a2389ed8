//! Structural validation for tool parameters and client-submitted results.
//!
//! Tools describe their parameters with a subset of JSON Schema: `type`, `properties`,
//! `required`, `enum`, `items`, `minimum`/`maximum` and `anyOf`. That subset is all the registered tools
//! use, and it is enough to tell the model precisely which argument is wrong.
use serde_json::Value;

use crate::errors::{AgentError, AgentResult};

/// Validate `value` against `schema`, returning `InvalidParameters` naming the first violation.
pub fn validate(schema: &Value, value: &Value) -> AgentResult<()> {
    check(schema, value, "$").map_err(AgentError::InvalidParameters)
}

fn check(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    let Some(schema) = schema.as_object() else {
        return Ok(());
    };

    if let Some(Value::Array(branches)) = schema.get("anyOf") {
        let mut reasons = Vec::new();
        for branch in branches {
            match check(branch, value, path) {
                Ok(()) => {
                    reasons.clear();
                    break;
                }
                Err(reason) => reasons.push(reason),
            }
        }
        if !reasons.is_empty() {
            return Err(format!(
                "{} matches no allowed shape ({})",
                path,
                reasons.join("; ")
            ));
        }
    }

    if let Some(expected) = schema.get("type") {
        let allowed: Vec<&str> = match expected {
            Value::String(s) => vec![s.as_str()],
            Value::Array(types) => types.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| matches_type(t, value)) {
            return Err(format!(
                "{} must be of type {}, got {}",
                path,
                allowed.join(" | "),
                type_name(value)
            ));
        }
    }

    if let Some(Value::Array(options)) = schema.get("enum") {
        if !options.contains(value) {
            let listed: Vec<String> = options.iter().map(Value::to_string).collect();
            return Err(format!("{} must be one of {}", path, listed.join(", ")));
        }
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = schema.get("minimum").and_then(Value::as_f64) {
            if n < min {
                return Err(format!("{} must be >= {}", path, min));
            }
        }
        if let Some(max) = schema.get("maximum").and_then(Value::as_f64) {
            if n > max {
                return Err(format!("{} must be <= {}", path, max));
            }
        }
    }

    if let Value::Object(map) = value {
        if let Some(Value::Array(required)) = schema.get("required") {
            for key in required.iter().filter_map(Value::as_str) {
                if map.get(key).map_or(true, Value::is_null) {
                    return Err(format!("{}.{} is required", path, key));
                }
            }
        }
        if let Some(Value::Object(properties)) = schema.get("properties") {
            for (key, sub_schema) in properties {
                match map.get(key) {
                    Some(Value::Null) | None => {}
                    Some(v) => check(sub_schema, v, &format!("{}.{}", path, key))?,
                }
            }
        }
    }

    if let (Value::Array(items), Some(item_schema)) = (value, schema.get("items")) {
        for (i, item) in items.iter().enumerate() {
            check(item_schema, item, &format!("{}[{}]", path, i))?;
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["dataSource"],
            "properties": {
                "dataSource": {"type": "string", "enum": ["employees", "products"]},
                "limit": {"type": "integer", "minimum": 1, "maximum": 100},
                "columns": {"type": "array", "items": {"type": "string"}}
            }
        })
    }

    #[test]
    fn test_accepts_valid_arguments() {
        assert!(validate(&schema(), &json!({"dataSource": "employees", "limit": 5})).is_ok());
    }

    #[test]
    fn test_reports_missing_required_field() {
        let err = validate(&schema(), &json!({"limit": 5})).unwrap_err();
        assert_eq!(
            err,
            AgentError::InvalidParameters("$.dataSource is required".to_string())
        );
    }

    #[test]
    fn test_reports_enum_violation() {
        let err = validate(&schema(), &json!({"dataSource": "payroll"})).unwrap_err();
        assert!(err.to_string().contains("$.dataSource must be one of"));
    }

    #[test]
    fn test_reports_nested_item_type() {
        let err = validate(
            &schema(),
            &json!({"dataSource": "products", "columns": ["name", 3]}),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid parameters: $.columns[1] must be of type string, got number"
        );
    }

    #[test]
    fn test_reports_range_violation() {
        let err = validate(&schema(), &json!({"dataSource": "products", "limit": 500})).unwrap_err();
        assert!(err.to_string().ends_with("$.limit must be <= 100"));
    }

    #[test]
    fn test_any_of_accepts_either_branch() {
        let schema = json!({
            "anyOf": [
                {"type": "object", "required": ["approvedActionId"]},
                {"type": "object", "required": ["cancelled"], "properties": {"cancelled": {"enum": [true]}}}
            ]
        });
        assert!(validate(&schema, &json!({"approvedActionId": "approve", "cancelled": false})).is_ok());
        assert!(validate(&schema, &json!({"cancelled": true})).is_ok());
        let err = validate(&schema, &json!({"cancelled": false})).unwrap_err();
        assert!(err.to_string().contains("matches no allowed shape"));
    }

    #[test]
    fn test_union_types() {
        let schema = json!({"type": ["object", "null"]});
        assert!(validate(&schema, &json!(null)).is_ok());
        assert!(validate(&schema, &json!("x")).is_err());
    }
}
