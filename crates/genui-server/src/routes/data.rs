//! Read-only views of the DCM dataset for the dashboard.
use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use genui::dcm::{secondary, Deal, DcmDataset, DealQuery, DealSort};
use serde::Serialize;
use serde_json::{json, Value};

const RECENT_DEALS: usize = 20;
const ALLOCATION_DEALS: usize = 6;
const SECONDARY_DEALS: usize = 10;
const TOP_INVESTOR_TYPES: usize = 3;
/// Basis points of drift before a bond counts as moving.
const TREND_THRESHOLD: i64 = 3;

#[derive(Debug, Serialize)]
struct InvestorTypeShare {
    #[serde(rename = "type")]
    investor_type: &'static str,
    percentage: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AllocationSnapshot {
    deal_id: String,
    issuer_name: String,
    size: u32,
    oversubscription: f64,
    top_investor_types: Vec<InvestorTypeShare>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SecondarySnapshot {
    isin: String,
    issuer_name: String,
    issue_spread: i64,
    current_spread: i64,
    spread_drift: i64,
    trend: &'static str,
    avg_volume: f64,
}

fn recent(data: &DcmDataset, limit: usize) -> Vec<&Deal> {
    data.query_deals(&DealQuery {
        sort_by: DealSort::Date,
        limit: Some(limit),
        ..Default::default()
    })
}

fn allocation_snapshot(data: &DcmDataset, deal: &Deal) -> AllocationSnapshot {
    let allocations = data.allocations(deal);
    let total: u64 = allocations.iter().map(|a| a.allocated_size).sum();

    let mut by_type: Vec<(&'static str, u64)> = Vec::new();
    for allocation in &allocations {
        let label = allocation.investor_type.label();
        match by_type.iter_mut().find(|(t, _)| *t == label) {
            Some(entry) => entry.1 += allocation.allocated_size,
            None => by_type.push((label, allocation.allocated_size)),
        }
    }

    let mut shares: Vec<InvestorTypeShare> = by_type
        .into_iter()
        .map(|(investor_type, amount)| InvestorTypeShare {
            investor_type,
            percentage: if total == 0 {
                0
            } else {
                (amount as f64 / total as f64 * 100.0).round() as u64
            },
        })
        .collect();
    shares.sort_by(|a, b| b.percentage.cmp(&a.percentage));
    shares.truncate(TOP_INVESTOR_TYPES);

    AllocationSnapshot {
        deal_id: deal.id.clone(),
        issuer_name: deal.issuer_name.clone(),
        size: deal.size,
        oversubscription: deal.oversubscription,
        top_investor_types: shares,
    }
}

fn secondary_snapshot(deal: &Deal) -> SecondarySnapshot {
    let history = secondary::performance_series(deal, 30);
    let issue_spread = i64::from(deal.spread);
    let current_spread = history.last().map_or(issue_spread, |p| p.spread);
    let spread_drift = current_spread - issue_spread;
    let avg_volume = if history.is_empty() {
        0.0
    } else {
        history.iter().map(|p| p.volume_traded as f64).sum::<f64>() / history.len() as f64
    };

    let trend = if spread_drift < -TREND_THRESHOLD {
        "Tightening"
    } else if spread_drift > TREND_THRESHOLD {
        "Widening"
    } else {
        "Stable"
    };

    SecondarySnapshot {
        isin: deal.isin.clone(),
        issuer_name: deal.issuer_name.clone(),
        issue_spread,
        current_spread,
        spread_drift,
        trend,
        avg_volume,
    }
}

async fn deals_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({"deals": recent(&state.dataset, RECENT_DEALS)}))
}

async fn allocations_handler(State(state): State<AppState>) -> Json<Value> {
    let allocations: Vec<AllocationSnapshot> = recent(&state.dataset, ALLOCATION_DEALS)
        .into_iter()
        .map(|deal| allocation_snapshot(&state.dataset, deal))
        .collect();
    Json(json!({ "allocations": allocations }))
}

async fn secondary_handler(State(state): State<AppState>) -> Json<Value> {
    let secondary: Vec<SecondarySnapshot> = recent(&state.dataset, SECONDARY_DEALS)
        .into_iter()
        .map(secondary_snapshot)
        .collect();
    Json(json!({ "secondary": secondary }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/data/deals", get(deals_handler))
        .route("/api/data/allocations", get(allocations_handler))
        .route("/api/data/secondary", get(secondary_handler))
        .with_state(state)
}
