//! How a client turns tool invocations into widgets.
//!
//! Every known tool has one `ToolView` in a table keyed by tool name. A view knows whether
//! the tool is interactive and how to read the tool's result; reading the result into the
//! view's typed shape doubles as its validator. Unknown tools get a fallback, so rendering
//! never fails however the tool catalog grows.
use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ConversationError;
use crate::models::conversation::Conversation;
use crate::models::message::{Message, Resolution, ToolInvocation};
use crate::toolkits::{
    COLLECT_FILTERS, CONFIRM_ACTION, GENERATE_MANDATE_BRIEF, GET_ALLOCATIONS, GET_ENTITY_DETAILS,
    GET_INVESTOR_LIST, GET_ISSUER_DEALS, GET_MARKET_DEALS, GET_PARTICIPATION_HISTORY,
    GET_PEER_COMPARISON, GET_PERFORMANCE, GET_SECTOR_CURVE, QUERY_DATA, RESOLVE_ENTITY,
    SHOW_CHART, SHOW_TABLE,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Select,
    Date,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub default_value: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FilterForm {
    pub title: String,
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApprovalAction {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Approval {
    pub summary: String,
    pub risk: String,
    pub actions: Vec<ApprovalAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub banner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    pub title: String,
    #[serde(rename = "type")]
    pub chart_type: String,
    pub data: Vec<Value>,
    pub x_key: String,
    pub y_key: String,
    #[serde(default)]
    pub y_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCandidate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
}

impl EntityCandidate {
    pub fn display_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.name)
    }

    /// Picking a candidate continues the conversation with the chosen issuer.
    pub fn choose(&self) -> UserAction {
        UserAction::SendMessage {
            text: format!("I mean {} ({})", self.display_name(), self.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealStats {
    pub total_deals: u64,
    #[serde(default)]
    pub total_raised: u64,
    #[serde(default)]
    pub avg_tenor: String,
    #[serde(default)]
    pub avg_nip: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealRow {
    pub id: String,
    #[serde(default)]
    pub issuer_name: String,
    pub isin: String,
    pub pricing_date: String,
    pub currency: String,
    pub size: u64,
    pub tenor: String,
    pub coupon: f64,
    pub spread: i64,
    pub nip: i64,
    pub oversubscription: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerHeader {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IssuerTimeline {
    pub issuer: IssuerHeader,
    pub summary: DealStats,
    pub deals: Vec<DealRow>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    pub total_deals: u64,
    pub total_volume: u64,
    pub avg_spread: i64,
    pub avg_nip: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarketIssuance {
    pub summary: MarketStats,
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,
    pub deals: Vec<DealRow>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRow {
    pub issuer_id: String,
    pub issuer_name: String,
    pub summary: DealStats,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub nip_vs_peers: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparableDeals {
    pub issuer: IssuerHeader,
    pub issuer_summary: DealStats,
    pub peers: Vec<PeerRow>,
    pub comparison: Comparison,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Share {
    #[serde(alias = "type", alias = "geography")]
    pub label: String,
    pub amount: u64,
    pub percentage: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllocatedDeal {
    pub id: String,
    pub issuer: String,
    pub size: u64,
    pub oversubscription: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub by_type: Vec<Share>,
    pub by_geography: Vec<Share>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationSummary {
    pub total_investors: u64,
    pub total_allocated: u64,
    pub avg_fill_rate: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllocationBreakdown {
    pub deal: AllocatedDeal,
    pub breakdown: Breakdown,
    pub summary: AllocationSummary,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondHeader {
    pub isin: String,
    pub issuer: String,
    pub coupon: f64,
    pub tenor: String,
    pub issue_spread: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PerformancePoint {
    pub date: String,
    pub price: f64,
    pub spread: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Analysis {
    pub trend: String,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecondaryPerformance {
    pub bond: BondHeader,
    pub performance: Vec<PerformancePoint>,
    pub drift: i64,
    pub analysis: Analysis,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationRow {
    pub deal_name: String,
    pub date: String,
    pub allocated_size: u64,
    pub behaviour: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationSummary {
    pub total_participations: u64,
    pub hold_percentage: u64,
    pub flip_percentage: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationHistory {
    pub issuer_id: String,
    pub participations: Vec<ParticipationRow>,
    pub summary: ParticipationSummary,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BriefSection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brief {
    pub issuer_name: String,
    pub generated_at: String,
    pub sections: Vec<BriefSection>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportPanel {
    pub brief: Brief,
    pub export_formats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssuerProfile {
    pub title: String,
    pub facts: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorRow {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub investor_type: String,
    pub geography: String,
    pub flip_score: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvestorList {
    pub total: u64,
    pub investors: Vec<InvestorRow>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CurvePoint {
    pub tenor: String,
    pub spread: i64,
    #[serde(rename = "yield")]
    pub yield_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SectorCurve {
    pub sector: String,
    pub rating: String,
    pub benchmark: String,
    pub curve: Vec<CurvePoint>,
}

/// What the interface shows for one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    Loading { label: String },
    FilterForm { tool_call_id: String, form: FilterForm },
    Approval { tool_call_id: String, approval: Approval },
    Table(Table),
    Chart(Chart),
    EntityPicker { query: String, candidates: Vec<EntityCandidate> },
    EntityResolved(EntityCandidate),
    IssuerTimeline(IssuerTimeline),
    MarketIssuance(MarketIssuance),
    ComparableDeals(ComparableDeals),
    AllocationBreakdown(AllocationBreakdown),
    SecondaryPerformance(SecondaryPerformance),
    ParticipationHistory(ParticipationHistory),
    ExportPanel(ExportPanel),
    IssuerProfile(IssuerProfile),
    InvestorList(InvestorList),
    SectorCurve(SectorCurve),
    Submitted { text: String },
    ErrorNotice { tool_name: String, message: String },
    Fallback { tool_name: String, state: String },
}

impl Widget {
    pub fn is_interactive(&self) -> bool {
        matches!(self, Widget::FilterForm { .. } | Widget::Approval { .. })
    }
}

/// What a user did with an interactive widget.
#[derive(Debug, Clone, PartialEq)]
pub enum UserAction {
    SubmitToolResult { tool_call_id: String, result: Value },
    SendMessage { text: String },
}

impl UserAction {
    pub fn submit_filters(tool_call_id: &str, values: BTreeMap<String, String>) -> Self {
        UserAction::SubmitToolResult {
            tool_call_id: tool_call_id.to_string(),
            result: json!({ "values": values }),
        }
    }

    pub fn approve(tool_call_id: &str, action_id: &str) -> Self {
        UserAction::SubmitToolResult {
            tool_call_id: tool_call_id.to_string(),
            result: json!({"approvedActionId": action_id, "cancelled": false}),
        }
    }

    pub fn cancel(tool_call_id: &str) -> Self {
        UserAction::SubmitToolResult {
            tool_call_id: tool_call_id.to_string(),
            result: json!({"cancelled": true}),
        }
    }

    /// Fold the action into the conversation that will be resubmitted.
    pub fn apply(self, conversation: &mut Conversation) -> Result<Resolution, ConversationError> {
        match self {
            UserAction::SubmitToolResult {
                tool_call_id,
                result,
            } => conversation.add_tool_result(&tool_call_id, result),
            UserAction::SendMessage { text } => {
                conversation.push(Message::user().with_text(text));
                Ok(Resolution::Applied)
            }
        }
    }
}

type RenderCall = fn(&ToolInvocation) -> Result<Widget, serde_json::Error>;
type RenderResult = fn(&Value) -> Result<Widget, serde_json::Error>;

/// How one tool is presented.
#[derive(Clone, Copy)]
pub struct ToolView {
    /// Interactive tools render their widget on `call`; the rest show progress.
    pub interactive: bool,
    render_call: Option<RenderCall>,
    render_result: RenderResult,
}

impl ToolView {
    fn display(render_result: RenderResult) -> Self {
        Self {
            interactive: false,
            render_call: None,
            render_result,
        }
    }

    fn interactive(render_call: RenderCall, render_result: RenderResult) -> Self {
        Self {
            interactive: true,
            render_call: Some(render_call),
            render_result,
        }
    }

    /// Check a result against the shape this view reads.
    pub fn validate(&self, result: &Value) -> Result<(), String> {
        (self.render_result)(result)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

fn parse<T: DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
    T::deserialize(value)
}

fn render_table(result: &Value) -> Result<Widget, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Raw {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        data_source: Option<String>,
        columns: Vec<String>,
        rows: Vec<Value>,
        #[serde(default)]
        total_matches: Option<usize>,
    }

    let raw: Raw = parse(result)?;
    let banner = if raw.rows.is_empty() {
        Some("No results found".to_string())
    } else {
        raw.total_matches
            .map(|total| format!("Showing {} of {}", raw.rows.len(), total))
    };
    Ok(Widget::Table(Table {
        title: raw.title.or(raw.data_source).unwrap_or_default(),
        columns: raw.columns,
        rows: raw.rows,
        banner,
    }))
}

fn render_entity(result: &Value) -> Result<Widget, serde_json::Error> {
    #[derive(Deserialize)]
    struct Raw {
        matches: Vec<EntityCandidate>,
        confidence: String,
        query: String,
    }

    let raw: Raw = parse(result)?;
    match (raw.confidence.as_str(), raw.matches.as_slice()) {
        ("exact", [only]) => Ok(Widget::EntityResolved(only.clone())),
        _ => Ok(Widget::EntityPicker {
            query: raw.query,
            candidates: raw.matches,
        }),
    }
}

fn render_profile(result: &Value) -> Result<Widget, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Rating {
        agency: String,
        rating: String,
    }
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct IssuerFacts {
        name: String,
        short_name: String,
        lei: String,
        sector: String,
        country: String,
        ratings: Vec<Rating>,
    }
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    enum Raw {
        Issuer(IssuerFacts),
        Bond(DealRow),
    }

    let profile = match parse::<Raw>(result)? {
        Raw::Issuer(issuer) => {
            let ratings: Vec<String> = issuer
                .ratings
                .iter()
                .map(|r| format!("{} {}", r.agency, r.rating))
                .collect();
            IssuerProfile {
                title: issuer.short_name,
                facts: vec![
                    ("Legal Name".to_string(), issuer.name),
                    ("LEI".to_string(), issuer.lei),
                    ("Sector".to_string(), issuer.sector),
                    ("Country".to_string(), issuer.country),
                    ("Ratings".to_string(), ratings.join(", ")),
                ],
            }
        }
        Raw::Bond(deal) => IssuerProfile {
            title: format!("{} {}% {}", deal.issuer_name, deal.coupon, deal.tenor),
            facts: vec![
                ("ISIN".to_string(), deal.isin),
                ("Priced".to_string(), deal.pricing_date),
                ("Size".to_string(), format!("{} {}M", deal.currency, deal.size)),
                ("Spread".to_string(), format!("{}bps", deal.spread)),
                ("NIP".to_string(), format!("{}bps", deal.nip)),
                ("Book".to_string(), format!("{}x", deal.oversubscription)),
            ],
        },
    };
    Ok(Widget::IssuerProfile(profile))
}

fn render_filter_form(invocation: &ToolInvocation) -> Result<Widget, serde_json::Error> {
    Ok(Widget::FilterForm {
        tool_call_id: invocation.tool_call_id.clone(),
        form: parse(&invocation.args)?,
    })
}

fn render_approval(invocation: &ToolInvocation) -> Result<Widget, serde_json::Error> {
    Ok(Widget::Approval {
        tool_call_id: invocation.tool_call_id.clone(),
        approval: parse(&invocation.args)?,
    })
}

fn render_filters_submitted(result: &Value) -> Result<Widget, serde_json::Error> {
    let values: BTreeMap<String, Value> = parse(&result["values"])?;
    Ok(Widget::Submitted {
        text: format!("Filters applied: {}", json!(values)),
    })
}

fn render_approval_submitted(result: &Value) -> Result<Widget, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Raw {
        #[serde(default)]
        approved_action_id: Option<String>,
        #[serde(default)]
        cancelled: bool,
    }

    let raw: Raw = parse(result)?;
    let text = match raw.approved_action_id {
        Some(id) if !raw.cancelled => format!("Action approved: {}", id),
        _ => "Action cancelled".to_string(),
    };
    Ok(Widget::Submitted { text })
}

/// Tool name to view, registered once.
pub struct RendererRegistry {
    views: HashMap<&'static str, ToolView>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererRegistry {
    pub fn new() -> Self {
        let mut views = HashMap::new();
        views.insert(QUERY_DATA, ToolView::display(render_table));
        views.insert(SHOW_TABLE, ToolView::display(render_table));
        views.insert(
            SHOW_CHART,
            ToolView::display(|r| parse(r).map(Widget::Chart)),
        );
        views.insert(
            COLLECT_FILTERS,
            ToolView::interactive(render_filter_form, render_filters_submitted),
        );
        views.insert(
            CONFIRM_ACTION,
            ToolView::interactive(render_approval, render_approval_submitted),
        );
        views.insert(RESOLVE_ENTITY, ToolView::display(render_entity));
        views.insert(GET_ENTITY_DETAILS, ToolView::display(render_profile));
        views.insert(
            GET_ISSUER_DEALS,
            ToolView::display(|r| parse(r).map(Widget::IssuerTimeline)),
        );
        views.insert(
            GET_MARKET_DEALS,
            ToolView::display(|r| parse(r).map(Widget::MarketIssuance)),
        );
        views.insert(
            GET_PEER_COMPARISON,
            ToolView::display(|r| parse(r).map(Widget::ComparableDeals)),
        );
        views.insert(
            GET_ALLOCATIONS,
            ToolView::display(|r| parse(r).map(Widget::AllocationBreakdown)),
        );
        views.insert(
            GET_PERFORMANCE,
            ToolView::display(|r| parse(r).map(Widget::SecondaryPerformance)),
        );
        views.insert(
            GET_PARTICIPATION_HISTORY,
            ToolView::display(|r| parse(r).map(Widget::ParticipationHistory)),
        );
        views.insert(
            GENERATE_MANDATE_BRIEF,
            ToolView::display(|r| parse(r).map(Widget::ExportPanel)),
        );
        views.insert(
            GET_INVESTOR_LIST,
            ToolView::display(|r| parse(r).map(Widget::InvestorList)),
        );
        views.insert(
            GET_SECTOR_CURVE,
            ToolView::display(|r| parse(r).map(Widget::SectorCurve)),
        );
        Self { views }
    }

    pub fn view(&self, tool_name: &str) -> Option<&ToolView> {
        self.views.get(tool_name)
    }

    pub fn is_interactive(&self, tool_name: &str) -> bool {
        self.view(tool_name).is_some_and(|v| v.interactive)
    }

    /// Render one invocation. Never fails: problems become an error notice.
    pub fn render(&self, invocation: &ToolInvocation) -> Widget {
        let tool_name = invocation.tool_name.clone();
        let Some(view) = self.view(&invocation.tool_name) else {
            return Widget::Fallback {
                tool_name,
                state: invocation.state_name().to_string(),
            };
        };

        let rendered = match (invocation.result(), view.render_call) {
            (None, Some(render_call)) => render_call(invocation),
            (None, None) => {
                return Widget::Loading {
                    label: loading_label(invocation),
                }
            }
            (Some(result), _) => {
                if let Some(error) = result.get("error") {
                    let message = error
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string());
                    return Widget::ErrorNotice { tool_name, message };
                }
                (view.render_result)(result)
            }
        };

        rendered.unwrap_or_else(|e| Widget::ErrorNotice {
            tool_name,
            message: format!("Unexpected {} payload: {}", invocation.state_name(), e),
        })
    }
}

fn loading_label(invocation: &ToolInvocation) -> String {
    match invocation.tool_name.as_str() {
        QUERY_DATA => format!(
            "Querying {}...",
            invocation.args["dataSource"].as_str().unwrap_or("data")
        ),
        SHOW_CHART => "Rendering chart...".to_string(),
        SHOW_TABLE => "Loading table...".to_string(),
        RESOLVE_ENTITY => "Resolving entity...".to_string(),
        other => format!("Running {}...", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcm::DcmDataset;
    use crate::registry::Dispatch;
    use crate::toolkits;
    use std::sync::Arc;

    fn dcm_result(tool: &str, args: Value) -> ToolInvocation {
        let registry = toolkits::dcm_tools(Arc::new(DcmDataset::load())).unwrap();
        let Dispatch::Resolved(result) = registry.dispatch(tool, &args) else {
            panic!("expected a server tool");
        };
        ToolInvocation::call("call_1", tool, args).with_result(result)
    }

    #[test]
    fn test_call_state_shows_loading() {
        let renderer = RendererRegistry::new();
        let invocation = ToolInvocation::call("c", QUERY_DATA, json!({"dataSource": "employees"}));
        assert_eq!(
            renderer.render(&invocation),
            Widget::Loading {
                label: "Querying employees...".to_string()
            }
        );
        let invocation = ToolInvocation::call("c", GET_ALLOCATIONS, json!({"dealId": "x"}));
        assert_eq!(
            renderer.render(&invocation),
            Widget::Loading {
                label: "Running get_allocations...".to_string()
            }
        );
    }

    #[test]
    fn test_interactive_call_renders_widget() {
        let renderer = RendererRegistry::new();
        let invocation = ToolInvocation::call(
            "call_confirm",
            CONFIRM_ACTION,
            json!({
                "summary": "Delete 3 trades",
                "risk": "high",
                "actions": [{"id": "approve", "label": "Approve"}, {"id": "deny", "label": "Deny"}]
            }),
        );
        match renderer.render(&invocation) {
            Widget::Approval {
                tool_call_id,
                approval,
            } => {
                assert_eq!(tool_call_id, "call_confirm");
                assert_eq!(approval.actions.len(), 2);
                assert_eq!(approval.risk, "high");
            }
            other => panic!("expected approval, got {:?}", other),
        }
    }

    #[test]
    fn test_query_result_table_banner() {
        let renderer = RendererRegistry::new();
        let invocation = ToolInvocation::call("c", QUERY_DATA, json!({})).with_result(json!({
            "dataSource": "employees",
            "columns": ["Name"],
            "rows": [{"Name": "Ada"}, {"Name": "Grace"}],
            "showing": 2,
            "totalMatches": 12
        }));
        let Widget::Table(table) = renderer.render(&invocation) else {
            panic!("expected table");
        };
        assert_eq!(table.title, "employees");
        assert_eq!(table.banner.as_deref(), Some("Showing 2 of 12"));

        let empty = ToolInvocation::call("c", SHOW_TABLE, json!({}))
            .with_result(json!({"title": "Deals", "columns": [], "rows": []}));
        let Widget::Table(table) = renderer.render(&empty) else {
            panic!("expected table");
        };
        assert_eq!(table.banner.as_deref(), Some("No results found"));
    }

    #[test]
    fn test_error_result_renders_notice() {
        let renderer = RendererRegistry::new();
        let invocation = ToolInvocation::call("c", GET_ISSUER_DEALS, json!({"issuerId": "nope"}))
            .with_result(json!({"error": "Tool execution failed: Issuer not found: nope"}));
        assert_eq!(
            renderer.render(&invocation),
            Widget::ErrorNotice {
                tool_name: GET_ISSUER_DEALS.to_string(),
                message: "Tool execution failed: Issuer not found: nope".to_string()
            }
        );
    }

    #[test]
    fn test_wrong_shape_renders_notice() {
        let renderer = RendererRegistry::new();
        let invocation =
            ToolInvocation::call("c", SHOW_CHART, json!({})).with_result(json!({"title": "x"}));
        assert!(matches!(
            renderer.render(&invocation),
            Widget::ErrorNotice { .. }
        ));
        assert!(renderer.view(SHOW_CHART).unwrap().validate(&json!({})).is_err());
    }

    #[test]
    fn test_unknown_tool_falls_back() {
        let renderer = RendererRegistry::new();
        let invocation = ToolInvocation::call("c", "weather", json!({}));
        assert_eq!(
            renderer.render(&invocation),
            Widget::Fallback {
                tool_name: "weather".to_string(),
                state: "call".to_string()
            }
        );
    }

    #[test]
    fn test_client_results_render_as_submitted() {
        let renderer = RendererRegistry::new();
        let approved = ToolInvocation::call("c", CONFIRM_ACTION, json!({}))
            .with_result(json!({"approvedActionId": "approve", "cancelled": false}));
        let cancelled = ToolInvocation::call("c", CONFIRM_ACTION, json!({}))
            .with_result(json!({"cancelled": true}));
        let filters = ToolInvocation::call("c", COLLECT_FILTERS, json!({}))
            .with_result(json!({"values": {"currency": "EUR"}}));

        assert_eq!(
            renderer.render(&approved),
            Widget::Submitted {
                text: "Action approved: approve".to_string()
            }
        );
        assert_eq!(
            renderer.render(&cancelled),
            Widget::Submitted {
                text: "Action cancelled".to_string()
            }
        );
        assert_eq!(
            renderer.render(&filters),
            Widget::Submitted {
                text: "Filters applied: {\"currency\":\"EUR\"}".to_string()
            }
        );
    }

    #[test]
    fn test_user_actions_resolve_conversation() {
        let mut conversation = Conversation::from(vec![Message::assistant().with_tool_invocation(
            ToolInvocation::call("call_f", COLLECT_FILTERS, json!({"title": "Filter", "fields": []})),
        )]);
        let mut values = BTreeMap::new();
        values.insert("currency".to_string(), "EUR".to_string());

        assert_eq!(
            UserAction::submit_filters("call_f", values.clone()).apply(&mut conversation),
            Ok(Resolution::Applied)
        );
        assert_eq!(
            UserAction::submit_filters("call_f", values).apply(&mut conversation),
            Ok(Resolution::AlreadyResolved)
        );
        assert_eq!(
            conversation.find_invocation("call_f").unwrap().result(),
            Some(&json!({"values": {"currency": "EUR"}}))
        );
    }

    #[test]
    fn test_dcm_results_render_their_widgets() {
        let renderer = RendererRegistry::new();

        let resolved = dcm_result(RESOLVE_ENTITY, json!({"query": "BMW", "type": "issuer"}));
        let Widget::EntityResolved(bmw) = renderer.render(&resolved) else {
            panic!("expected a resolved entity");
        };
        assert_eq!(bmw.id, "bmw-ag");

        let cases = [
            (GET_ISSUER_DEALS, json!({"issuerId": "bmw-ag"})),
            (GET_MARKET_DEALS, json!({})),
            (GET_PEER_COMPARISON, json!({"issuerId": "bmw-ag"})),
            (GET_PARTICIPATION_HISTORY, json!({"issuerId": "bmw-ag"})),
            (GENERATE_MANDATE_BRIEF, json!({"issuerId": "bmw-ag"})),
            (GET_ENTITY_DETAILS, json!({"entityId": "bmw-ag", "type": "issuer"})),
            (GET_INVESTOR_LIST, json!({})),
            (GET_SECTOR_CURVE, json!({"sector": "Automobiles", "rating": "A"})),
        ];
        for (tool, args) in cases {
            let widget = renderer.render(&dcm_result(tool, args));
            assert!(
                !matches!(widget, Widget::ErrorNotice { .. } | Widget::Fallback { .. }),
                "{} rendered {:?}",
                tool,
                widget
            );
        }
    }
}
