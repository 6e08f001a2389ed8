use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{json_arg, optional_count, required_str};
use super::{QUERY_DATA, SHOW_CHART};
use crate::data::aggregate::format_currency;
use crate::data::{DataCatalog, DataSource};
use crate::errors::{AgentError, AgentResult};
use crate::registry::ToolDefinition;

const DEFAULT_LIMIT: usize = 20;

/// Column keys whose numeric values are shown as money.
const MONEY_KEYS: [&str; 4] = ["rice", "alary", "otional", "alue"];

/// Tools over the tabular data catalog. Descriptions are built from the catalog, so the
/// model only ever sees sources and aggregations that exist.
pub struct TabularToolkit {
    catalog: Arc<DataCatalog>,
}

impl TabularToolkit {
    pub fn new(catalog: Arc<DataCatalog>) -> Self {
        Self { catalog }
    }

    pub fn query_data(&self) -> ToolDefinition {
        let sources: Vec<String> = self
            .catalog
            .sources()
            .iter()
            .map(|s| format!("- \"{}\": {}", s.name(), s.description()))
            .collect();
        let description = format!(
            "Query data from available sources.\n\nAvailable data sources:\n{}\n\n\
             Returns matching records as a table. Pass filters as a JSON string.",
            sources.join("\n")
        );

        let catalog = Arc::clone(&self.catalog);
        ToolDefinition::server(
            QUERY_DATA,
            description,
            json!({
                "type": "object",
                "required": ["dataSource", "filtersJson", "limit"],
                "properties": {
                    "dataSource": {
                        "type": "string",
                        "enum": self.catalog.names(),
                        "description": "Which data source to query"
                    },
                    "filtersJson": {
                        "type": "string",
                        "description": "Filter criteria as JSON string, e.g. {\"department\":\"Engineering\"} or \"{}\" for no filters"
                    },
                    "limit": {
                        "type": "number",
                        "minimum": 0,
                        "description": "Maximum number of results to return"
                    }
                }
            }),
            move |params: Value| run_query(&catalog, &params),
        )
    }

    pub fn show_chart(&self) -> ToolDefinition {
        let lines: Vec<String> = self
            .catalog
            .sources()
            .iter()
            .filter(|s| !s.chart_aggregations().is_empty())
            .map(|s| {
                let aggs: Vec<String> = s
                    .chart_aggregations()
                    .iter()
                    .map(|a| {
                        format!(
                            "\"{}:{}\" ({}, {})",
                            s.name(),
                            a.key,
                            a.label,
                            json!(a.recommended_type).as_str().unwrap_or_default()
                        )
                    })
                    .collect();
                format!("- {}: {}", s.name(), aggs.join(", "))
            })
            .collect();
        let description = format!(
            "Display a chart from available data sources.\n\nAvailable chart aggregations:\n{}\n\n\
             Specify aggregation as \"dataSource:aggregationType\" (e.g., \"employees:byDepartment\").",
            lines.join("\n")
        );

        let catalog = Arc::clone(&self.catalog);
        ToolDefinition::server(
            SHOW_CHART,
            description,
            json!({
                "type": "object",
                "required": ["title", "type", "aggregation", "filtersJson"],
                "properties": {
                    "title": {"type": "string", "description": "Chart title"},
                    "type": {"type": "string", "enum": ["bar", "line", "pie", "area"], "description": "Chart type"},
                    "aggregation": {
                        "type": "string",
                        "description": "Aggregation in format \"dataSource:type\" (e.g., \"employees:byDepartment\")"
                    },
                    "filtersJson": {"type": "string", "description": "Filters as JSON string, or \"{}\" for no filters"}
                }
            }),
            move |params: Value| run_chart(&catalog, &params),
        )
    }
}

fn source<'a>(catalog: &'a DataCatalog, name: &str) -> AgentResult<&'a Arc<dyn DataSource>> {
    catalog
        .get(name)
        .ok_or_else(|| AgentError::ExecutionError(format!("Unknown data source: {}", name)))
}

fn display_row(source: &dyn DataSource, record: &Value) -> Value {
    let mut row = Map::new();
    for column in source.columns() {
        let value = record.get(column.key).cloned().unwrap_or(Value::Null);
        let value = match value.as_f64() {
            Some(n) if MONEY_KEYS.iter().any(|k| column.key.contains(k)) => {
                Value::String(format_currency(n))
            }
            _ => value,
        };
        row.insert(column.label.to_string(), value);
    }
    Value::Object(row)
}

fn run_query(catalog: &DataCatalog, params: &Value) -> AgentResult<Value> {
    let name = required_str(params, "dataSource")?;
    let source = source(catalog, name)?;
    let filters = json_arg(params, "filtersJson")?;
    let limit = optional_count(params, "limit")
        .filter(|l| *l > 0)
        .unwrap_or(DEFAULT_LIMIT);

    let records = source.query(&filters)?;
    let rows: Vec<Value> = records
        .iter()
        .take(limit)
        .map(|r| display_row(source.as_ref(), r))
        .collect();
    tracing::debug!(source = name, matches = records.len(), "queried data source");

    Ok(json!({
        "dataSource": name,
        "columns": source.columns().iter().map(|c| c.label).collect::<Vec<_>>(),
        "showing": rows.len(),
        "rows": rows,
        "totalMatches": records.len(),
        "summary": source.summary(&records),
    }))
}

fn run_chart(catalog: &DataCatalog, params: &Value) -> AgentResult<Value> {
    let aggregation = required_str(params, "aggregation")?;
    let (name, kind) = aggregation.split_once(':').unwrap_or((aggregation, ""));
    let source = source(catalog, name)?;
    let config = source.chart_aggregation(kind).ok_or_else(|| {
        AgentError::ExecutionError(format!("Unknown aggregation type: {} for {}", kind, name))
    })?;
    let filters = json_arg(params, "filtersJson")?;

    let records = source.query(&filters)?;
    Ok(json!({
        "title": required_str(params, "title")?,
        "type": required_str(params, "type")?,
        "data": source.aggregate(&records, kind)?,
        "xKey": config.x_key,
        "yKey": config.y_key,
        "yLabel": config.label,
        "summary": source.summary(&records),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Dispatch, ToolRegistry};

    fn registry() -> ToolRegistry {
        let toolkit = TabularToolkit::new(Arc::new(DataCatalog::demo()));
        let mut registry = ToolRegistry::new();
        registry.register(toolkit.query_data()).unwrap();
        registry.register(toolkit.show_chart()).unwrap();
        registry
    }

    fn resolved(dispatch: Dispatch) -> Value {
        match dispatch {
            Dispatch::Resolved(value) => value,
            Dispatch::Pending => panic!("server tool left pending"),
        }
    }

    #[test]
    fn test_query_filters_rows() {
        let result = resolved(registry().dispatch(
            QUERY_DATA,
            &json!({"dataSource": "employees", "filtersJson": "{\"department\":\"Engineering\"}", "limit": 100}),
        ));
        let rows = result["rows"].as_array().unwrap();
        assert_eq!(rows.len() as u64, result["totalMatches"].as_u64().unwrap());
        assert!(rows.len() < 50);
        assert!(rows.iter().all(|r| r["Department"] == "Engineering"));
    }

    #[test]
    fn test_query_formats_money_and_defaults_limit() {
        let result = resolved(registry().dispatch(
            QUERY_DATA,
            &json!({"dataSource": "employees", "filtersJson": "{}", "limit": 0}),
        ));
        assert_eq!(result["showing"], 20);
        assert_eq!(result["totalMatches"], 50);
        assert!(result["rows"][0]["Salary"].as_str().unwrap().starts_with('$'));
    }

    #[test]
    fn test_query_unknown_source_is_rejected() {
        let result = resolved(registry().dispatch(
            QUERY_DATA,
            &json!({"dataSource": "weather", "filtersJson": "{}", "limit": 5}),
        ));
        assert!(result["error"].as_str().unwrap().starts_with("Invalid parameters"));
    }

    #[test]
    fn test_chart_uses_aggregation_config() {
        let result = resolved(registry().dispatch(
            SHOW_CHART,
            &json!({"title": "Headcount", "type": "bar", "aggregation": "employees:byDepartment", "filtersJson": "{}"}),
        ));
        assert_eq!(result["type"], "bar");
        assert!(!result["data"].as_array().unwrap().is_empty());
        assert!(result["xKey"].is_string());
    }

    #[test]
    fn test_chart_unknown_aggregation() {
        let result = resolved(registry().dispatch(
            SHOW_CHART,
            &json!({"title": "x", "type": "bar", "aggregation": "employees:byShoeSize", "filtersJson": "{}"}),
        ));
        assert_eq!(
            result["error"],
            "Tool execution failed: Unknown aggregation type: byShoeSize for employees"
        );
    }
}
