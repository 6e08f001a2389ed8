//! The tool sets behind each chat workflow.
//!
//! Registries are composed here, once, in a fixed order. The order is part of the prompt
//! the model sees, so the same build always produces the same prompt.
mod dcm;
mod display;
mod tabular;

use std::sync::Arc;

use serde_json::Value;

use crate::data::DataCatalog;
use crate::dcm::DcmDataset;
use crate::errors::{AgentError, AgentResult};
use crate::registry::ToolRegistry;

pub use dcm::DcmToolkit;
pub use tabular::TabularToolkit;

pub const QUERY_DATA: &str = "query_data";
pub const SHOW_CHART: &str = "show_chart";
pub const SHOW_TABLE: &str = "show_table";
pub const COLLECT_FILTERS: &str = "collect_filters";
pub const CONFIRM_ACTION: &str = "confirm_action";

pub const RESOLVE_ENTITY: &str = "resolve_entity";
pub const GET_ENTITY_DETAILS: &str = "get_entity_details";
pub const GET_MARKET_DEALS: &str = "get_market_deals";
pub const GET_ISSUER_DEALS: &str = "get_issuer_deals";
pub const GET_PEER_COMPARISON: &str = "get_peer_comparison";
pub const GET_ALLOCATIONS: &str = "get_allocations";
pub const GET_PERFORMANCE: &str = "get_performance";
pub const GET_PARTICIPATION_HISTORY: &str = "get_participation_history";
pub const GET_INVESTOR_LIST: &str = "get_investor_list";
pub const GET_SECTOR_CURVE: &str = "get_sector_curve";
pub const GENERATE_MANDATE_BRIEF: &str = "generate_mandate_brief";

/// Tools for `/api/chat`: catalog queries, charts and tables, plus the two interactive tools.
pub fn chat_tools(catalog: Arc<DataCatalog>) -> AgentResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    let toolkit = TabularToolkit::new(catalog);
    registry.register(toolkit.query_data())?;
    registry.register(toolkit.show_chart())?;
    registry.register(display::show_table())?;
    registry.register(display::collect_filters())?;
    registry.register(display::confirm_action())?;
    Ok(registry)
}

/// Tools for `/api/dcm/chat`: the issuance toolkit followed by the generic display tools.
pub fn dcm_tools(data: Arc<DcmDataset>) -> AgentResult<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for tool in DcmToolkit::new(data).tools() {
        registry.register(tool)?;
    }
    registry.register(display::show_table())?;
    registry.register(display::show_chart())?;
    registry.register(display::confirm_action())?;
    registry.register(display::collect_filters())?;
    Ok(registry)
}

pub(crate) fn required_str<'a>(params: &'a Value, key: &str) -> AgentResult<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::InvalidParameters(format!("Missing '{}' parameter", key)))
}

/// A string argument, treating absent, null and empty as not given.
pub(crate) fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn optional_count(params: &Value, key: &str) -> Option<usize> {
    params
        .get(key)
        .and_then(Value::as_f64)
        .filter(|n| *n >= 0.0)
        .map(|n| n as usize)
}

/// Parse an argument the model passes as a JSON-encoded string.
pub(crate) fn json_arg(params: &Value, key: &str) -> AgentResult<Value> {
    let raw = required_str(params, key)?.trim();
    if raw.is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
        .map_err(|e| AgentError::InvalidParameters(format!("'{}' is not valid JSON: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_tool_order() {
        let registry = chat_tools(Arc::new(DataCatalog::demo())).unwrap();
        let names: Vec<String> = registry.list_for_prompt().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![QUERY_DATA, SHOW_CHART, SHOW_TABLE, COLLECT_FILTERS, CONFIRM_ACTION]
        );
    }

    #[test]
    fn test_dcm_tools_include_display_tools() {
        let registry = dcm_tools(Arc::new(DcmDataset::load())).unwrap();
        assert_eq!(registry.len(), 15);
        assert!(registry.resolve(RESOLVE_ENTITY).unwrap().is_server_side());
        assert!(!registry.resolve(CONFIRM_ACTION).unwrap().is_server_side());
        assert!(registry.resolve(QUERY_DATA).is_err());
    }

    #[test]
    fn test_json_arg() {
        let params = json!({"filtersJson": "{\"department\":\"Engineering\"}", "empty": " "});
        assert_eq!(
            json_arg(&params, "filtersJson").unwrap(),
            json!({"department": "Engineering"})
        );
        assert_eq!(json_arg(&params, "empty").unwrap(), json!({}));
        assert!(matches!(
            json_arg(&json!({"filtersJson": "{oops"}), "filtersJson"),
            Err(AgentError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_optional_args() {
        let params = json!({"sector": "", "limit": 5.0, "currency": "EUR"});
        assert_eq!(optional_str(&params, "sector"), None);
        assert_eq!(optional_str(&params, "currency"), Some("EUR"));
        assert_eq!(optional_count(&params, "limit"), Some(5));
        assert_eq!(optional_count(&params, "missing"), None);
    }
}
