use serde_json::{json, Value};

use super::{json_arg, optional_str, required_str};
use super::{COLLECT_FILTERS, CONFIRM_ACTION, SHOW_CHART, SHOW_TABLE};
use crate::errors::{AgentError, AgentResult};
use crate::registry::ToolDefinition;

fn json_array(params: &Value, key: &str) -> AgentResult<Value> {
    match json_arg(params, key)? {
        rows @ Value::Array(_) => Ok(rows),
        other => Err(AgentError::InvalidParameters(format!(
            "'{}' must encode a JSON array, got {}",
            key, other
        ))),
    }
}

pub fn show_table() -> ToolDefinition {
    ToolDefinition::server(
        SHOW_TABLE,
        "Display data in a table format. Use this when the user asks to see data as a table. \
         Pass the rows as a JSON array string.",
        json!({
            "type": "object",
            "required": ["title", "columns", "rowsJson"],
            "properties": {
                "title": {"type": "string", "description": "The title of the table"},
                "columns": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Column headers"
                },
                "rowsJson": {
                    "type": "string",
                    "description": "Table rows as a JSON array string, e.g. [{\"col1\":\"val1\",\"col2\":\"val2\"}]"
                }
            }
        }),
        |params: Value| {
            let rows = json_array(&params, "rowsJson")?;
            Ok(json!({
                "title": required_str(&params, "title")?,
                "columns": params.get("columns").cloned().unwrap_or_else(|| json!([])),
                "rows": rows,
            }))
        },
    )
}

/// Chart over data the model already has, as opposed to the catalog-backed chart.
pub fn show_chart() -> ToolDefinition {
    ToolDefinition::server(
        SHOW_CHART,
        "Display data as a chart (bar, line, pie, or area). Use this when the user asks to \
         visualize data. Pass the data as a JSON array string.",
        json!({
            "type": "object",
            "required": ["title", "type", "dataJson", "xKey", "yKey"],
            "properties": {
                "title": {"type": "string", "description": "Chart title"},
                "type": {"type": "string", "enum": ["bar", "line", "pie", "area"], "description": "Chart type"},
                "dataJson": {
                    "type": "string",
                    "description": "Chart data as JSON array string, e.g. [{\"label\":\"A\",\"value\":10}]"
                },
                "xKey": {"type": "string", "description": "Key for x-axis values in the data objects"},
                "yKey": {"type": "string", "description": "Key for y-axis values in the data objects"},
                "yLabel": {"type": "string", "description": "Label for y-axis"}
            }
        }),
        |params: Value| {
            let data = json_array(&params, "dataJson")?;
            let y_key = required_str(&params, "yKey")?;
            Ok(json!({
                "title": required_str(&params, "title")?,
                "type": required_str(&params, "type")?,
                "data": data,
                "xKey": required_str(&params, "xKey")?,
                "yKey": y_key,
                "yLabel": optional_str(&params, "yLabel").unwrap_or(y_key),
            }))
        },
    )
}

pub fn collect_filters() -> ToolDefinition {
    ToolDefinition::client(
        COLLECT_FILTERS,
        "Display a form to collect filter criteria or other input from the user. Use select \
         fields with options taken from real data values.",
        json!({
            "type": "object",
            "required": ["title", "fields"],
            "properties": {
                "title": {"type": "string", "description": "The title of the form"},
                "fields": {
                    "type": "array",
                    "description": "The form fields to display",
                    "items": {
                        "type": "object",
                        "required": ["key", "label", "type"],
                        "properties": {
                            "key": {"type": "string", "description": "Unique identifier for this field"},
                            "label": {"type": "string", "description": "Display label for the field"},
                            "type": {"type": "string", "enum": ["text", "select", "date"], "description": "The input type"},
                            "options": {
                                "type": "array",
                                "items": {"type": "string"},
                                "description": "Options for select type (use empty array [] if not select)"
                            },
                            "defaultValue": {"type": "string", "description": "Default value (use empty string \"\" if none)"}
                        }
                    }
                }
            }
        }),
        json!({
            "type": "object",
            "required": ["values"],
            "properties": {
                "values": {"type": "object"}
            }
        }),
    )
}

pub fn confirm_action() -> ToolDefinition {
    ToolDefinition::client(
        CONFIRM_ACTION,
        "Present action buttons to the user. Use for confirmations, approvals and next-step \
         choices, not for filtering.",
        json!({
            "type": "object",
            "required": ["summary", "risk", "actions"],
            "properties": {
                "summary": {"type": "string", "description": "Description or question to present"},
                "risk": {"type": "string", "enum": ["low", "medium", "high"], "description": "Risk level (use \"low\" for simple choices)"},
                "actions": {
                    "type": "array",
                    "description": "Available action buttons",
                    "items": {
                        "type": "object",
                        "required": ["id", "label"],
                        "properties": {
                            "id": {"type": "string", "description": "Unique action identifier"},
                            "label": {"type": "string", "description": "Button label"}
                        }
                    }
                }
            }
        }),
        json!({
            "anyOf": [
                {
                    "type": "object",
                    "required": ["approvedActionId", "cancelled"],
                    "properties": {
                        "approvedActionId": {"type": "string"},
                        "cancelled": {"enum": [false]}
                    }
                },
                {
                    "type": "object",
                    "required": ["cancelled"],
                    "properties": {
                        "cancelled": {"enum": [true]}
                    }
                }
            ]
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Dispatch, ToolRegistry};

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(show_table()).unwrap();
        registry.register(show_chart()).unwrap();
        registry.register(collect_filters()).unwrap();
        registry.register(confirm_action()).unwrap();
        registry
    }

    #[test]
    fn test_show_table_parses_rows() {
        let result = registry().dispatch(
            SHOW_TABLE,
            &json!({"title": "Deals", "columns": ["Issuer"], "rowsJson": "[{\"Issuer\":\"BMW\"}]"}),
        );
        assert_eq!(
            result,
            Dispatch::Resolved(json!({
                "title": "Deals",
                "columns": ["Issuer"],
                "rows": [{"Issuer": "BMW"}]
            }))
        );
    }

    #[test]
    fn test_show_table_rejects_non_array_rows() {
        let Dispatch::Resolved(result) = registry().dispatch(
            SHOW_TABLE,
            &json!({"title": "Deals", "columns": [], "rowsJson": "{\"a\":1}"}),
        ) else {
            panic!("expected a resolved result");
        };
        assert!(result["error"].as_str().unwrap().contains("rowsJson"));
    }

    #[test]
    fn test_show_chart_defaults_y_label() {
        let Dispatch::Resolved(result) = registry().dispatch(
            SHOW_CHART,
            &json!({
                "title": "Spreads",
                "type": "line",
                "dataJson": "[{\"date\":\"2025-01-01\",\"spread\":80}]",
                "xKey": "date",
                "yKey": "spread"
            }),
        ) else {
            panic!("expected a resolved result");
        };
        assert_eq!(result["yLabel"], "spread");
        assert_eq!(result["data"][0]["spread"], 80);
    }

    #[test]
    fn test_interactive_tools_stay_pending() {
        let registry = registry();
        let form = json!({"title": "Filter", "fields": [{"key": "ccy", "label": "Currency", "type": "select", "options": ["EUR"], "defaultValue": ""}]});
        assert_eq!(registry.dispatch(COLLECT_FILTERS, &form), Dispatch::Pending);
        let confirm = json!({"summary": "Send?", "risk": "low", "actions": [{"id": "approve", "label": "Approve"}]});
        assert_eq!(registry.dispatch(CONFIRM_ACTION, &confirm), Dispatch::Pending);
    }

    #[test]
    fn test_confirm_action_result_shapes() {
        let definition = confirm_action();
        let shape = definition.result_schema().unwrap();
        assert!(crate::schema::validate(shape, &json!({"approvedActionId": "approve", "cancelled": false})).is_ok());
        assert!(crate::schema::validate(shape, &json!({"cancelled": true})).is_ok());
        assert!(crate::schema::validate(shape, &json!({"approvedActionId": "approve"})).is_err());
        assert!(crate::schema::validate(shape, &json!({"cancelled": false})).is_err());
    }
}
