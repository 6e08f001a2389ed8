//! Read-only synthetic datasets exposed through one query/aggregate/summary contract.
//!
//! Records cross this boundary as JSON objects. Each source keeps typed records internally
//! and decides on its own filter semantics; callers only ever see `Value`s.
pub mod aggregate;
pub mod bond_trades;
pub mod employees;
pub mod products;

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{AgentError, AgentResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Pie,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartAggregation {
    pub key: &'static str,
    pub label: &'static str,
    pub x_key: &'static str,
    pub y_key: &'static str,
    pub recommended_type: ChartType,
}

/// A dataset the tools can query without knowing its record shape.
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted filter object. Every filter is optional.
    fn filter_schema(&self) -> Value;

    fn columns(&self) -> &[Column];

    fn chart_aggregations(&self) -> &[ChartAggregation];

    /// Return the records matching `filters`, an object whose keys come from `filter_schema`.
    fn query(&self, filters: &Value) -> AgentResult<Vec<Value>>;

    /// Reduce records to chart points for one of `chart_aggregations`.
    fn aggregate(&self, records: &[Value], kind: &str) -> AgentResult<Vec<Value>>;

    fn summary(&self, records: &[Value]) -> Map<String, Value>;

    fn chart_aggregation(&self, kind: &str) -> Option<&ChartAggregation> {
        self.chart_aggregations().iter().find(|a| a.key == kind)
    }
}

/// Deserialize a filter object, treating `null` as "no filters".
pub(crate) fn parse_filters<F: DeserializeOwned + Default>(source: &str, filters: &Value) -> AgentResult<F> {
    if filters.is_null() {
        return Ok(F::default());
    }
    serde_json::from_value(filters.clone())
        .map_err(|e| AgentError::InvalidParameters(format!("{} filters: {}", source, e)))
}

pub(crate) fn to_records<T: Serialize>(items: impl IntoIterator<Item = T>) -> Vec<Value> {
    items
        .into_iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect()
}

pub(crate) fn unknown_aggregation(source: &str, kind: &str) -> AgentError {
    AgentError::ExecutionError(format!("Unknown aggregation '{}' for {}", kind, source))
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &Option<String>) -> bool {
    needle
        .as_deref()
        .map_or(true, |n| haystack.to_lowercase().contains(&n.to_lowercase()))
}

pub(crate) fn equals(value: &str, expected: &Option<String>) -> bool {
    expected.as_deref().map_or(true, |e| value == e)
}

/// The data sources of the tabular workflow, in registration order.
#[derive(Clone, Default)]
pub struct DataCatalog {
    sources: Vec<Arc<dyn DataSource>>,
}

impl DataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the three demo datasets with dates anchored on `anchor`.
    pub fn generate(anchor: NaiveDate, seed: u64) -> Self {
        let mut catalog = Self::new();
        catalog.register(Arc::new(bond_trades::BondTrades::generate(anchor, seed)));
        catalog.register(Arc::new(employees::Employees::generate(seed.wrapping_add(1))));
        catalog.register(Arc::new(products::Products::generate(anchor, seed.wrapping_add(2))));
        catalog
    }

    pub fn demo() -> Self {
        Self::generate(Utc::now().date_naive(), 42)
    }

    pub fn register(&mut self, source: Arc<dyn DataSource>) {
        self.sources.retain(|s| s.name() != source.name());
        self.sources.push(source);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DataSource>> {
        self.sources.iter().find(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn sources(&self) -> &[Arc<dyn DataSource>] {
        &self.sources
    }

    /// Markdown listing of every source for the system prompt.
    pub fn describe(&self) -> String {
        if self.sources.is_empty() {
            return "No data sources available.".to_string();
        }

        self.sources
            .iter()
            .map(|source| {
                let schema = source.filter_schema();
                let filters: Vec<&str> = schema
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|p| p.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                let aggregations: Vec<&str> =
                    source.chart_aggregations().iter().map(|a| a.key).collect();
                format!(
                    "- **{}**: {}\n  Filters: {}\n  Chart aggregations: {}",
                    source.name(),
                    source.description(),
                    or_none(&filters.join(", ")),
                    or_none(&aggregations.join(", ")),
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn or_none(s: &str) -> &str {
    if s.is_empty() {
        "none"
    } else {
        s
    }
}
