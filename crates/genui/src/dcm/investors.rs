use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{char_code_sum, lcg, round_to, DcmDataset, Deal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvestorType {
    #[serde(rename = "Asset Manager")]
    AssetManager,
    Insurance,
    Pension,
    Bank,
    #[serde(rename = "Hedge Fund")]
    HedgeFund,
    #[serde(rename = "Central Bank")]
    CentralBank,
}

impl InvestorType {
    pub fn label(self) -> &'static str {
        match self {
            InvestorType::AssetManager => "Asset Manager",
            InvestorType::Insurance => "Insurance",
            InvestorType::Pension => "Pension",
            InvestorType::Bank => "Bank",
            InvestorType::HedgeFund => "Hedge Fund",
            InvestorType::CentralBank => "Central Bank",
        }
    }

    /// Order as a share of deal size: floor plus a random band, and the draw step
    /// multiplier used for this type.
    fn order_band(self) -> (f64, f64, u64) {
        match self {
            InvestorType::AssetManager => (0.08, 0.12, 2),
            InvestorType::Insurance => (0.05, 0.08, 3),
            InvestorType::Pension => (0.04, 0.06, 4),
            InvestorType::Bank => (0.03, 0.05, 5),
            InvestorType::HedgeFund => (0.02, 0.04, 6),
            InvestorType::CentralBank => (0.06, 0.10, 7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Investor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub investor_type: InvestorType,
    pub geography: String,
    /// Assets under management, millions.
    pub aum: u64,
    pub focus_sectors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub deal_id: String,
    pub investor_id: String,
    pub investor_name: String,
    pub investor_type: InvestorType,
    pub geography: String,
    pub order_size: u64,
    pub allocated_size: u64,
    pub fill_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Behaviour {
    Hold,
    PartialFlip,
    Flip,
}

impl Behaviour {
    fn weight(self) -> f64 {
        match self {
            Behaviour::Hold => 0.0,
            Behaviour::PartialFlip => 0.5,
            Behaviour::Flip => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    pub deal_id: String,
    pub deal_name: String,
    pub issuer_name: String,
    pub date: NaiveDate,
    pub order_size: u64,
    pub allocated_size: u64,
    pub fill_rate: f64,
    pub held_days: u32,
    pub sold_percentage: u32,
    pub behaviour: Behaviour,
}

/// Book for one deal: 8 to 12 investors drawn in a deal-specific order, each placing an
/// order sized by investor type and filled at 30 to 80%.
pub(super) fn allocations_for_deal(investors: &[Investor], deal: &Deal) -> Vec<Allocation> {
    let seed = char_code_sum(&deal.id);
    let rng = |n: u64| lcg(seed, n);
    let size = f64::from(deal.size);

    let count = 8 + (rng(1) * 5.0).floor() as usize;
    let mut shuffled: Vec<&Investor> = investors.iter().collect();
    shuffled.sort_by(|a, b| rng(a.id.len() as u64).total_cmp(&rng(b.id.len() as u64)));

    shuffled
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, investor)| {
            let i = i as u64;
            let (floor, band, step) = investor.investor_type.order_band();
            let order_size = (size * (floor + rng(i * step) * band)).round() as u64;
            let fill = 0.3 + rng(i * 8) * 0.5;
            Allocation {
                deal_id: deal.id.clone(),
                investor_id: investor.id.clone(),
                investor_name: investor.name.clone(),
                investor_type: investor.investor_type,
                geography: investor.geography.clone(),
                order_size,
                allocated_size: (order_size as f64 * fill).round() as u64,
                fill_rate: round_to(fill, 2),
            }
        })
        .collect()
}

fn behaviour_for(deal_id: &str, investor_id: &str) -> (u32, u32, Behaviour) {
    let seed = char_code_sum(deal_id) + char_code_sum(investor_id);
    let r = lcg(seed, 0);
    let held_days = (30.0 + r * 150.0).floor() as u32;
    let sold = if r < 0.6 {
        0
    } else if r < 0.8 {
        (r * 50.0).floor() as u32
    } else {
        (50.0 + r * 50.0).floor() as u32
    };
    let behaviour = match sold {
        0 => Behaviour::Hold,
        s if s < 50 => Behaviour::PartialFlip,
        _ => Behaviour::Flip,
    };
    (held_days, sold, behaviour)
}

/// Every allocation across the deal table, optionally narrowed to one investor and/or
/// one issuer, newest deal first.
pub(super) fn participation_history(
    data: &DcmDataset,
    investor_id: Option<&str>,
    issuer_id: Option<&str>,
) -> Vec<Participation> {
    let mut history = Vec::new();
    for deal in data.deals() {
        if issuer_id.is_some_and(|id| deal.issuer_id != id) {
            continue;
        }
        for alloc in allocations_for_deal(data.investors(), deal) {
            if investor_id.is_some_and(|id| alloc.investor_id != id) {
                continue;
            }
            let (held_days, sold_percentage, behaviour) =
                behaviour_for(&deal.id, &alloc.investor_id);
            history.push(Participation {
                deal_id: deal.id.clone(),
                deal_name: deal.display_name(),
                issuer_name: deal.issuer_name.clone(),
                date: deal.pricing_date,
                order_size: alloc.order_size,
                allocated_size: alloc.allocated_size,
                fill_rate: alloc.fill_rate,
                held_days,
                sold_percentage,
                behaviour,
            });
        }
    }
    history.sort_by(|a, b| b.date.cmp(&a.date));
    history
}

/// 0 for a pure holder, 100 for an investor who flips everything. No history scores 50.
pub(super) fn flip_score(history: &[Participation]) -> u32 {
    if history.is_empty() {
        return 50;
    }
    let weight: f64 = history.iter().map(|p| p.behaviour.weight()).sum();
    (weight / history.len() as f64 * 100.0).round() as u32
}

fn investor(
    id: &str,
    name: &str,
    investor_type: InvestorType,
    geography: &str,
    aum: u64,
    focus: &[&str],
) -> Investor {
    Investor {
        id: id.to_string(),
        name: name.to_string(),
        investor_type,
        geography: geography.to_string(),
        aum,
        focus_sectors: focus.iter().map(|s| s.to_string()).collect(),
    }
}

pub(super) fn seed() -> Vec<Investor> {
    use InvestorType::*;
    const AUTO: &str = "Automobiles";
    const IND: &str = "Industrials";
    const ENERGY: &str = "Energy";
    const CHEM: &str = "Chemicals";
    const CONS: &str = "Consumer Goods";

    vec![
        investor("blackrock", "BlackRock", AssetManager, "US", 9_500_000, &[AUTO, IND, ENERGY, CONS]),
        investor("pimco", "PIMCO", AssetManager, "US", 1_800_000, &[AUTO, IND, ENERGY]),
        investor("amundi", "Amundi", AssetManager, "France", 2_100_000, &[AUTO, IND, CHEM, CONS]),
        investor("dws", "DWS Group", AssetManager, "Germany", 900_000, &[AUTO, IND, CHEM]),
        investor("fidelity", "Fidelity Investments", AssetManager, "US", 4_200_000, &[AUTO, ENERGY, CONS]),
        investor("schroders", "Schroders", AssetManager, "UK", 750_000, &[AUTO, IND, CONS]),
        investor("allianz-im", "Allianz Global Investors", Insurance, "Germany", 680_000, &[AUTO, IND, ENERGY]),
        investor("axa-im", "AXA Investment Managers", Insurance, "France", 850_000, &[AUTO, IND, CONS]),
        investor("prudential", "Prudential Financial", Insurance, "US", 1_500_000, &[AUTO, ENERGY, IND]),
        investor("swiss-re", "Swiss Re", Insurance, "Switzerland", 220_000, &[ENERGY, IND]),
        investor("calpers", "CalPERS", Pension, "US", 450_000, &[AUTO, IND, ENERGY]),
        investor("abp", "ABP", Pension, "Netherlands", 530_000, &[AUTO, IND, CONS]),
        investor("gpif", "GPIF", Pension, "Japan", 1_600_000, &[AUTO, ENERGY]),
        investor("deutsche-am", "Deutsche Bank Wealth Management", Bank, "Germany", 450_000, &[AUTO, IND]),
        investor("ubs-am", "UBS Asset Management", Bank, "Switzerland", 1_100_000, &[AUTO, CONS, ENERGY]),
        investor("bridgewater", "Bridgewater Associates", HedgeFund, "US", 150_000, &[AUTO, ENERGY]),
        investor("citadel", "Citadel", HedgeFund, "US", 62_000, &[AUTO, IND]),
        investor("norges-bank", "Norges Bank Investment Management", CentralBank, "Norway", 1_400_000, &[AUTO, IND, ENERGY, CONS]),
    ]
}
