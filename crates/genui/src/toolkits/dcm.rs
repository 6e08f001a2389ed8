use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use super::{optional_count, optional_str, required_str};
use super::{
    GENERATE_MANDATE_BRIEF, GET_ALLOCATIONS, GET_ENTITY_DETAILS, GET_INVESTOR_LIST,
    GET_ISSUER_DEALS, GET_MARKET_DEALS, GET_PARTICIPATION_HISTORY, GET_PEER_COMPARISON,
    GET_PERFORMANCE, GET_SECTOR_CURVE, RESOLVE_ENTITY,
};
use crate::data::aggregate::format_number;
use crate::dcm::{secondary, Behaviour, DcmDataset, DealQuery, DealSort, DealSummary, MarketSummary};
use crate::errors::{AgentError, AgentResult};
use crate::registry::ToolDefinition;

const BRIEF_SECTIONS: [&str; 5] = [
    "overview",
    "issuance_history",
    "peer_comparison",
    "investor_analysis",
    "secondary_performance",
];
const EXPORT_FORMATS: [&str; 4] = ["pdf", "pptx", "xlsx", "email"];
const MARKET_DEALS_DEFAULT: usize = 10;
const MARKET_DEALS_MAX: usize = 50;
const PERFORMANCE_DEFAULT_DAYS: usize = 30;
const PARTICIPATIONS_SHOWN: usize = 15;

type Handler = fn(&DcmDataset, &Value) -> AgentResult<Value>;

/// Issuance, bookbuilding, investor and secondary-market tools over the DCM dataset.
/// Every tool here runs on the server.
pub struct DcmToolkit {
    data: Arc<DcmDataset>,
}

impl DcmToolkit {
    pub fn new(data: Arc<DcmDataset>) -> Self {
        Self { data }
    }

    fn tool(&self, name: &str, description: &str, parameters: Value, handler: Handler) -> ToolDefinition {
        let data = Arc::clone(&self.data);
        ToolDefinition::server(name, description, parameters, move |params: Value| {
            handler(data.as_ref(), &params)
        })
    }

    pub fn tools(&self) -> Vec<ToolDefinition> {
        vec![
            self.tool(
                RESOLVE_ENTITY,
                "Resolve an entity name (issuer) to canonical identifiers. Returns disambiguation \
                 options when multiple matches are found. ALWAYS call this first when the user \
                 mentions a company name.",
                json!({
                    "type": "object",
                    "required": ["query", "type"],
                    "properties": {
                        "query": {"type": "string", "description": "The entity name to resolve (e.g., \"BMW\", \"Volkswagen\")"},
                        "type": {"type": "string", "enum": ["issuer", "bond"], "description": "The type of entity to resolve"}
                    }
                }),
                resolve_entity,
            ),
            self.tool(
                GET_ENTITY_DETAILS,
                "Get detailed information about a resolved entity by its canonical ID.",
                json!({
                    "type": "object",
                    "required": ["entityId", "type"],
                    "properties": {
                        "entityId": {"type": "string", "description": "The canonical issuer ID (e.g., \"bmw-ag\"), or a deal ID or ISIN for bonds"},
                        "type": {"type": "string", "enum": ["issuer", "bond"], "description": "The type of entity"}
                    }
                }),
                entity_details,
            ),
            self.tool(
                GET_MARKET_DEALS,
                "Get recent bond deals across all issuers. Use when the user asks for a market \
                 overview, all issuance, supply data or recent deals WITHOUT naming a specific \
                 issuer. Does NOT require an issuer.",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": {"type": "number", "minimum": 0, "description": "Number of deals to return (default: 10, max: 50)"},
                        "sector": {"type": "string", "description": "Filter by sector (e.g., \"Automobiles\", \"Energy\")"},
                        "currency": {"type": "string", "description": "Filter by currency (e.g., \"EUR\", \"USD\")"},
                        "issuer": {"type": "string", "description": "Filter by issuer ID or name"}
                    }
                }),
                market_deals,
            ),
            self.tool(
                GET_ISSUER_DEALS,
                "Get all bond deals for a specific issuer, including summary statistics. Use \
                 after resolving the issuer.",
                json!({
                    "type": "object",
                    "required": ["issuerId"],
                    "properties": {
                        "issuerId": {"type": "string", "description": "The canonical issuer ID (e.g., \"bmw-ag\")"},
                        "limit": {"type": "number", "minimum": 0, "description": "Maximum number of deals to return (default: all)"}
                    }
                }),
                issuer_deals,
            ),
            self.tool(
                GET_PEER_COMPARISON,
                "Compare an issuer's issuance metrics against sector peers.",
                json!({
                    "type": "object",
                    "required": ["issuerId"],
                    "properties": {
                        "issuerId": {"type": "string", "description": "The canonical issuer ID to compare"},
                        "sector": {"type": "string", "description": "Override sector for comparison (default: the issuer's sector)"}
                    }
                }),
                peer_comparison,
            ),
            self.tool(
                GET_ALLOCATIONS,
                "Get the allocation breakdown for a specific deal, including investor type and \
                 geography distribution. Use the deal id from a previous deals result.",
                json!({
                    "type": "object",
                    "required": ["dealId"],
                    "properties": {
                        "dealId": {"type": "string", "description": "The deal ID to get allocations for"}
                    }
                }),
                allocations,
            ),
            self.tool(
                GET_PERFORMANCE,
                "Get secondary market performance for a bond (price, spread and volume over time).",
                json!({
                    "type": "object",
                    "required": ["isin"],
                    "properties": {
                        "isin": {"type": "string", "description": "The ISIN of the bond"},
                        "days": {"type": "number", "minimum": 0, "description": "Number of days of performance data (default: 30, max: 90)"}
                    }
                }),
                performance,
            ),
            self.tool(
                GET_PARTICIPATION_HISTORY,
                "Get participation history for investors in an issuer's deals.",
                json!({
                    "type": "object",
                    "required": ["issuerId"],
                    "properties": {
                        "issuerId": {"type": "string", "description": "The issuer ID to get investor participation for"}
                    }
                }),
                participation_history,
            ),
            self.tool(
                GET_INVESTOR_LIST,
                "Get the list of investors with their flip scores, optionally filtered by type or \
                 geography.",
                json!({
                    "type": "object",
                    "properties": {
                        "type": {"type": "string", "description": "Filter by investor type (e.g., \"Asset Manager\", \"Insurance\")"},
                        "geography": {"type": "string", "description": "Filter by geography (e.g., \"US\", \"Germany\")"}
                    }
                }),
                investor_list,
            ),
            self.tool(
                GET_SECTOR_CURVE,
                "Get the credit spread curve for a sector and rating combination.",
                json!({
                    "type": "object",
                    "required": ["sector", "rating"],
                    "properties": {
                        "sector": {"type": "string", "description": "The sector (e.g., \"Automobiles\", \"Industrials\", \"Energy\")"},
                        "rating": {"type": "string", "description": "The credit rating (e.g., \"A\", \"BBB+\", \"AA-\")"}
                    }
                }),
                sector_curve,
            ),
            self.tool(
                GENERATE_MANDATE_BRIEF,
                "Generate a mandate brief document for an issuer with full data provenance. Use \
                 this when the user wants to export or create a pitch document.",
                json!({
                    "type": "object",
                    "required": ["issuerId"],
                    "properties": {
                        "issuerId": {"type": "string", "description": "The issuer ID to generate the brief for"},
                        "sections": {
                            "type": "array",
                            "items": {"type": "string", "enum": BRIEF_SECTIONS},
                            "description": "Sections to include (default: all)"
                        }
                    }
                }),
                mandate_brief,
            ),
        ]
    }
}

fn resolve_entity(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let query = required_str(params, "query")?;
    if required_str(params, "type")? != "issuer" {
        return Ok(json!({"matches": [], "confidence": "fuzzy", "query": query}));
    }

    let matches = data.search_issuers(query);
    let (confidence, shown) = match matches.as_slice() {
        [] => ("fuzzy", Vec::new()),
        [top, rest @ ..] if top.score >= 0.9 && rest.first().map_or(true, |m| m.score < 0.7) => {
            ("exact", vec![top.issuer])
        }
        _ => ("ambiguous", matches.iter().take(5).map(|m| m.issuer).collect()),
    };
    tracing::debug!(query, confidence, matches = matches.len(), "resolved entity");
    Ok(json!({"matches": shown, "confidence": confidence, "query": query}))
}

fn entity_details(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let id = required_str(params, "entityId")?;
    match required_str(params, "type")? {
        "bond" => {
            let deal = data.deal(id).or_else(|_| data.deal_by_isin(id))?;
            Ok(json!({"bond": deal}))
        }
        _ => Ok(json!({"issuer": data.issuer(id)?})),
    }
}

/// "All" is what the filter form offers for no filter.
fn filter_value(params: &Value, key: &str) -> Option<String> {
    optional_str(params, key)
        .filter(|v| !v.eq_ignore_ascii_case("all"))
        .map(str::to_string)
}

fn market_deals(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let limit = optional_count(params, "limit")
        .filter(|l| *l > 0)
        .unwrap_or(MARKET_DEALS_DEFAULT)
        .min(MARKET_DEALS_MAX);
    let query = DealQuery {
        sector: filter_value(params, "sector"),
        currency: filter_value(params, "currency"),
        issuer: filter_value(params, "issuer"),
        sort_by: DealSort::Date,
        limit: Some(limit),
    };
    let deals = data.query_deals(&query);

    let mut sectors = BTreeSet::new();
    let mut currencies = BTreeSet::new();
    let mut issuers = BTreeSet::new();
    for deal in data.deals() {
        if let Some(sector) = data.sector_of(&deal.issuer_id) {
            sectors.insert(sector);
        }
        currencies.insert(deal.currency.as_str());
        issuers.insert(deal.issuer_name.as_str());
    }

    Ok(json!({
        "summary": MarketSummary::of(data, &deals),
        "filters": {
            "sector": query.sector.as_deref().unwrap_or("All"),
            "currency": query.currency.as_deref().unwrap_or("All"),
            "issuer": query.issuer.as_deref().unwrap_or("All"),
            "showing": deals.len(),
        },
        "deals": deals,
        "availableFilters": {
            "sectors": sectors,
            "currencies": currencies,
            "issuers": issuers,
        },
    }))
}

fn issuer_deals(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let issuer = data.issuer(required_str(params, "issuerId")?)?;
    let deals = data.deals_for_issuer(&issuer.id, optional_count(params, "limit"));
    Ok(json!({
        "issuer": {
            "id": issuer.id,
            "name": issuer.short_name,
            "fullName": issuer.name,
            "sector": issuer.sector,
            "ratings": issuer.ratings,
        },
        "summary": DealSummary::of(&deals),
        "deals": deals,
    }))
}

fn peer_comparison(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let issuer = data.issuer(required_str(params, "issuerId")?)?;
    let sector = optional_str(params, "sector").unwrap_or(&issuer.sector);

    let deals = data.deals_for_issuer(&issuer.id, None);
    let summary = DealSummary::of(&deals);

    let peers: Vec<Value> = data
        .peers(sector, &issuer.id)
        .into_iter()
        .map(|peer| {
            let peer_deals = data.deals_for_issuer(&peer.id, None);
            json!({
                "issuerId": peer.id,
                "issuerName": peer.short_name,
                "deals": peer_deals.iter().take(3).collect::<Vec<_>>(),
                "summary": DealSummary::of(&peer_deals),
            })
        })
        .collect();

    let peer_nips: Vec<f64> = peers
        .iter()
        .filter_map(|p| p["summary"]["avgNip"].as_f64())
        .collect();
    let peer_avg_nip = if peer_nips.is_empty() {
        0.0
    } else {
        peer_nips.iter().sum::<f64>() / peer_nips.len() as f64
    };

    let nip_vs_peers = if summary.avg_nip < peer_avg_nip {
        format!("{}bps tighter than peers", (peer_avg_nip - summary.avg_nip).round())
    } else if summary.avg_nip > peer_avg_nip {
        format!("{}bps wider than peers", (summary.avg_nip - peer_avg_nip).round())
    } else {
        "In line with peers".to_string()
    };

    Ok(json!({
        "issuer": {"id": issuer.id, "name": issuer.short_name, "sector": sector},
        "issuerDeals": deals.iter().take(5).collect::<Vec<_>>(),
        "issuerSummary": summary,
        "peers": peers,
        "comparison": {"nipVsPeers": nip_vs_peers},
    }))
}

/// Amount per key in first-seen order, largest first, with each key's share of `total`.
fn breakdown<'a>(entries: impl Iterator<Item = (&'a str, u64)>, total: u64, label: &str) -> Vec<Value> {
    let mut groups: Vec<(&str, u64)> = Vec::new();
    for (key, amount) in entries {
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some(group) => group.1 += amount,
            None => groups.push((key, amount)),
        }
    }
    groups.sort_by(|a, b| b.1.cmp(&a.1));
    groups
        .into_iter()
        .map(|(key, amount)| {
            let percentage = if total == 0 {
                0
            } else {
                (amount as f64 / total as f64 * 100.0).round() as u64
            };
            json!({label: key, "amount": amount, "percentage": percentage})
        })
        .collect()
}

fn allocations(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let deal = data.deal(required_str(params, "dealId")?)?;
    let allocations = data.allocations(deal);
    let total: u64 = allocations.iter().map(|a| a.allocated_size).sum();
    let avg_fill = if allocations.is_empty() {
        0.0
    } else {
        allocations.iter().map(|a| a.fill_rate).sum::<f64>() / allocations.len() as f64
    };

    Ok(json!({
        "deal": {
            "id": deal.id,
            "issuer": deal.issuer_name,
            "size": deal.size,
            "oversubscription": deal.oversubscription,
        },
        "breakdown": {
            "byType": breakdown(
                allocations.iter().map(|a| (a.investor_type.label(), a.allocated_size)),
                total,
                "type",
            ),
            "byGeography": breakdown(
                allocations.iter().map(|a| (a.geography.as_str(), a.allocated_size)),
                total,
                "geography",
            ),
        },
        "summary": {
            "totalInvestors": allocations.len(),
            "totalAllocated": total,
            "avgFillRate": (avg_fill * 100.0).round() as u64,
        },
        "allocations": allocations,
    }))
}

fn performance(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let deal = data.deal_by_isin(required_str(params, "isin")?)?;
    let days = optional_count(params, "days").unwrap_or(PERFORMANCE_DEFAULT_DAYS);
    let days = u32::try_from(days).unwrap_or(secondary::MAX_DAYS);

    let drift = secondary::spread_drift(deal);
    let (trend, interpretation) = if drift < -5 {
        ("Tightening", "Bond has performed well post-issuance")
    } else if drift > 5 {
        ("Widening", "Bond has underperformed post-issuance")
    } else {
        ("Stable", "Bond trading close to issue levels")
    };

    Ok(json!({
        "bond": {
            "isin": deal.isin,
            "issuer": deal.issuer_name,
            "coupon": deal.coupon,
            "tenor": deal.tenor,
            "issueSpread": deal.spread,
            "issuePrice": deal.reoffer,
        },
        "performance": secondary::performance_series(deal, days),
        "drift": drift,
        "summary": secondary::performance_summary(deal),
        "analysis": {"trend": trend, "interpretation": interpretation},
    }))
}

fn percentage(count: usize, total: usize) -> u64 {
    if total == 0 {
        0
    } else {
        (count as f64 / total as f64 * 100.0).round() as u64
    }
}

fn participation_history(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let issuer = data.issuer(required_str(params, "issuerId")?)?;
    let history = data.participation_history(None, Some(&issuer.id));
    let holds = history.iter().filter(|p| p.behaviour == Behaviour::Hold).count();
    let flips = history.iter().filter(|p| p.behaviour == Behaviour::Flip).count();

    Ok(json!({
        "issuerId": issuer.id,
        "participations": history.iter().take(PARTICIPATIONS_SHOWN).collect::<Vec<_>>(),
        "summary": {
            "totalParticipations": history.len(),
            "holdPercentage": percentage(holds, history.len()),
            "flipPercentage": percentage(flips, history.len()),
        },
    }))
}

fn investor_list(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let investor_type = optional_str(params, "type");
    let geography = optional_str(params, "geography");

    let investors: Vec<Value> = data
        .investors()
        .iter()
        .filter(|i| investor_type.map_or(true, |t| i.investor_type.label().eq_ignore_ascii_case(t)))
        .filter(|i| geography.map_or(true, |g| i.geography.eq_ignore_ascii_case(g)))
        .map(|i| {
            let mut entry = json!(i);
            entry["flipScore"] = json!(data.flip_score(&i.id));
            entry
        })
        .collect();

    Ok(json!({"total": investors.len(), "investors": investors}))
}

fn sector_curve(_data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let curve = secondary::sector_curve(required_str(params, "sector")?, required_str(params, "rating")?);
    let mut result = json!(curve);
    result["asOf"] = json!(Utc::now().date_naive());
    Ok(result)
}

fn mandate_brief(data: &DcmDataset, params: &Value) -> AgentResult<Value> {
    let issuer = data.issuer(required_str(params, "issuerId")?)?;
    let requested: Vec<&str> = match params.get("sections").and_then(Value::as_array) {
        Some(list) if !list.is_empty() => list.iter().filter_map(Value::as_str).collect(),
        _ => BRIEF_SECTIONS.to_vec(),
    };
    let wants = |section: &str| requested.contains(&section);

    let deals = data.deals_for_issuer(&issuer.id, None);
    let summary = DealSummary::of(&deals);
    let mut sources: Vec<&str> = Vec::new();
    let mut sections: Vec<Value> = Vec::new();

    if wants("overview") {
        sources.push("mcp-entity-resolution");
        let ratings: Vec<String> = issuer
            .ratings
            .iter()
            .map(|r| format!("{}: {}", r.agency, r.rating))
            .collect();
        sections.push(json!({
            "title": "Issuer Overview",
            "content": format!(
                "{} ({}) is a {} company based in {}. Credit ratings: {}.",
                issuer.name, issuer.short_name, issuer.sector, issuer.country, ratings.join(", ")
            ),
            "dataPoints": [
                {"field": "Legal Name", "value": issuer.name},
                {"field": "LEI", "value": issuer.lei},
                {"field": "Sector", "value": issuer.sector},
                {"field": "Country", "value": issuer.country},
            ],
        }));
    }

    if wants("issuance_history") {
        sources.push("mcp-issuance");
        let points: Vec<Value> = deals
            .iter()
            .take(5)
            .map(|d| {
                json!({
                    "deal": format!("{}% {}", d.coupon, d.tenor),
                    "date": d.pricing_date,
                    "size": format!("€{}M", d.size),
                    "spread": format!("{}bps", d.spread),
                })
            })
            .collect();
        sections.push(json!({
            "title": "Issuance History",
            "content": format!(
                "{} has completed {} bond issuances, raising €{}M. Average NIP: {}bps.",
                issuer.short_name,
                summary.total_deals,
                format_number(summary.total_raised as f64),
                summary.avg_nip
            ),
            "dataPoints": points,
        }));
    }

    if wants("peer_comparison") {
        sources.push("mcp-issuance");
        sections.push(json!({
            "title": "Peer Comparison",
            "content": format!(
                "Compared to {} sector peers, {}'s average NIP of {}bps and oversubscription of {}x reflects strong investor demand.",
                issuer.sector, issuer.short_name, summary.avg_nip, summary.avg_oversubscription
            ),
        }));
    }

    if let Some(latest) = deals.first() {
        if wants("investor_analysis") {
            sources.extend(["mcp-bookbuild", "mcp-investor"]);
            sections.push(json!({
                "title": "Investor Analysis",
                "content": format!(
                    "Most recent deal attracted {} institutional investors with {}x oversubscription.",
                    data.allocations(latest).len(),
                    latest.oversubscription
                ),
            }));
        }
        if wants("secondary_performance") {
            sources.push("mcp-secondary");
            sections.push(json!({
                "title": "Secondary Performance",
                "content": format!(
                    "{}'s bonds have generally performed well in the secondary market.",
                    issuer.short_name
                ),
            }));
        }
    }

    if sections.is_empty() {
        return Err(AgentError::InvalidParameters(format!(
            "No brief sections available for {}",
            issuer.short_name
        )));
    }

    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    Ok(json!({
        "brief": {
            "issuerId": issuer.id,
            "issuerName": issuer.short_name,
            "generatedAt": now,
            "sections": sections,
            "provenance": {
                "sources": sources,
                "timestamp": now,
                "queryContext": format!("Mandate brief for {}", issuer.short_name),
            },
        },
        "exportFormats": EXPORT_FORMATS,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Dispatch, ToolRegistry};

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in DcmToolkit::new(Arc::new(DcmDataset::load())).tools() {
            registry.register(tool).unwrap();
        }
        registry
    }

    fn call(name: &str, args: Value) -> Value {
        match registry().dispatch(name, &args) {
            Dispatch::Resolved(value) => value,
            Dispatch::Pending => panic!("{} left pending", name),
        }
    }

    #[test]
    fn test_resolve_entity_confidence() {
        let exact = call(RESOLVE_ENTITY, json!({"query": "BMW", "type": "issuer"}));
        assert_eq!(exact["confidence"], "exact");
        assert_eq!(exact["matches"][0]["id"], "bmw-ag");

        let ambiguous = call(RESOLVE_ENTITY, json!({"query": "ag", "type": "issuer"}));
        assert_eq!(ambiguous["confidence"], "ambiguous");
        assert_eq!(ambiguous["matches"].as_array().unwrap().len(), 5);

        let none = call(RESOLVE_ENTITY, json!({"query": "Tesla", "type": "issuer"}));
        assert_eq!(none["confidence"], "fuzzy");
        let bond = call(RESOLVE_ENTITY, json!({"query": "BMW", "type": "bond"}));
        assert_eq!(bond["matches"], json!([]));
    }

    #[test]
    fn test_issuer_deals() {
        let result = call(GET_ISSUER_DEALS, json!({"issuerId": "bmw-ag", "limit": 2}));
        assert_eq!(result["issuer"]["name"], "BMW AG");
        assert_eq!(result["deals"].as_array().unwrap().len(), 2);
        assert_eq!(result["deals"][0]["id"], "bmw-001");
        assert_eq!(result["summary"]["totalDeals"], 2);
    }

    #[test]
    fn test_unknown_issuer_is_in_band_error() {
        let result = call(GET_ISSUER_DEALS, json!({"issuerId": "acme"}));
        assert_eq!(result["error"], "Tool execution failed: Issuer not found: acme");
    }

    #[test]
    fn test_peer_comparison() {
        let result = call(GET_PEER_COMPARISON, json!({"issuerId": "siemens-ag"}));
        assert_eq!(result["issuer"]["sector"], "Industrials");
        assert_eq!(result["peers"], json!([]));
        assert_eq!(result["comparison"]["nipVsPeers"], "3bps wider than peers");

        let autos = call(GET_PEER_COMPARISON, json!({"issuerId": "bmw-ag"}));
        assert_eq!(autos["peers"].as_array().unwrap().len(), 4);
        assert!(autos["comparison"]["nipVsPeers"].as_str().unwrap().contains("peers"));
    }

    #[test]
    fn test_allocations_breakdown() {
        let result = call(GET_ALLOCATIONS, json!({"dealId": "bmw-001"}));
        let total = result["summary"]["totalAllocated"].as_u64().unwrap();
        let by_type = result["breakdown"]["byType"].as_array().unwrap();
        assert_eq!(
            by_type.iter().map(|t| t["amount"].as_u64().unwrap()).sum::<u64>(),
            total
        );
        assert!(by_type.windows(2).all(|w| w[0]["amount"].as_u64() >= w[1]["amount"].as_u64()));
        assert_eq!(result["allocations"][0]["dealId"], "bmw-001");
    }

    #[test]
    fn test_performance_caps_days() {
        let result = call(GET_PERFORMANCE, json!({"isin": "XS2725478901", "days": 400}));
        let series = result["performance"].as_array().unwrap();
        assert!(series.iter().all(|p| p["daysFromPricing"].as_u64().unwrap() <= 90));
        assert!(["Tightening", "Widening", "Stable"].contains(&result["analysis"]["trend"].as_str().unwrap()));

        let missing = call(GET_PERFORMANCE, json!({"isin": "XS0000000000"}));
        assert_eq!(missing["error"], "Tool execution failed: Bond not found: XS0000000000");
    }

    #[test]
    fn test_participation_history() {
        let result = call(GET_PARTICIPATION_HISTORY, json!({"issuerId": "bmw-ag"}));
        assert!(result["participations"].as_array().unwrap().len() <= 15);
        let hold = result["summary"]["holdPercentage"].as_u64().unwrap();
        let flip = result["summary"]["flipPercentage"].as_u64().unwrap();
        assert!(hold + flip <= 101);
    }

    #[test]
    fn test_market_deals_filters() {
        let result = call(
            GET_MARKET_DEALS,
            json!({"sector": "Automobiles", "currency": "All", "limit": 100}),
        );
        assert_eq!(result["filters"]["sector"], "Automobiles");
        assert_eq!(result["filters"]["currency"], "All");
        assert_eq!(result["filters"]["showing"], 12);
        assert_eq!(
            result["availableFilters"]["currencies"],
            json!(["EUR", "USD"])
        );

        let default = call(GET_MARKET_DEALS, json!({}));
        assert_eq!(default["deals"].as_array().unwrap().len(), 10);
        assert_eq!(default["deals"][0]["id"], "mb-001");
    }

    #[test]
    fn test_mandate_brief_sections() {
        let result = call(GENERATE_MANDATE_BRIEF, json!({"issuerId": "bmw-ag"}));
        let sections = result["brief"]["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 5);
        assert_eq!(
            sections[1]["content"],
            "BMW AG has completed 4 bond issuances, raising €3,750M. Average NIP: 6.5bps."
        );
        assert_eq!(result["brief"]["provenance"]["queryContext"], "Mandate brief for BMW AG");
        assert_eq!(result["exportFormats"], json!(["pdf", "pptx", "xlsx", "email"]));

        let overview_only = call(
            GENERATE_MANDATE_BRIEF,
            json!({"issuerId": "audi-ag", "sections": ["overview", "investor_analysis"]}),
        );
        assert_eq!(overview_only["brief"]["sections"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_entity_details_and_investors() {
        let bond = call(GET_ENTITY_DETAILS, json!({"entityId": "XS2725478901", "type": "bond"}));
        assert_eq!(bond["bond"]["id"], "bmw-001");
        let issuer = call(GET_ENTITY_DETAILS, json!({"entityId": "shell-plc", "type": "issuer"}));
        assert_eq!(issuer["issuer"]["shortName"], "Shell");

        let hedge_funds = call(GET_INVESTOR_LIST, json!({"type": "hedge fund"}));
        assert_eq!(hedge_funds["total"], 2);
        assert!(hedge_funds["investors"][0]["flipScore"].as_u64().unwrap() <= 100);
    }

    #[test]
    fn test_sector_curve() {
        let result = call(GET_SECTOR_CURVE, json!({"sector": "Energy", "rating": "AA-"}));
        assert_eq!(result["benchmark"], "EUR Mid-Swap");
        assert_eq!(result["curve"].as_array().unwrap().len(), 9);
        assert!(result["asOf"].is_string());
    }
}
