use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{round_to, DcmDataset, Issuer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Format {
    RegS,
    #[serde(rename = "144A")]
    Rule144A,
    #[serde(rename = "RegS/144A")]
    RegSAnd144A,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Seniority {
    Senior,
    Subordinated,
    Secured,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub issuer_id: String,
    pub issuer_name: String,
    pub isin: String,
    pub announce_date: NaiveDate,
    pub pricing_date: NaiveDate,
    pub settle_date: NaiveDate,
    pub currency: String,
    /// Millions in `currency`.
    pub size: u32,
    pub tenor: String,
    pub coupon: f64,
    pub reoffer: f64,
    /// Basis points over the benchmark.
    pub spread: u32,
    /// New issue premium in basis points.
    pub nip: u32,
    pub format: Format,
    pub seniority: Seniority,
    pub leads: Vec<String>,
    pub co_leads: Vec<String>,
    pub oversubscription: f64,
}

impl Deal {
    pub fn tenor_years(&self) -> u32 {
        self.tenor.trim_end_matches('Y').parse().unwrap_or(0)
    }

    /// "BMW AG 3.25% 5Y"
    pub fn display_name(&self) -> String {
        format!("{} {}% {}", self.issuer_name, self.coupon, self.tenor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DealSummary {
    pub total_deals: usize,
    pub total_raised: u64,
    pub avg_tenor: String,
    pub avg_nip: f64,
    pub avg_oversubscription: f64,
}

impl DealSummary {
    pub fn of(deals: &[&Deal]) -> Self {
        if deals.is_empty() {
            return DealSummary {
                total_deals: 0,
                total_raised: 0,
                avg_tenor: "N/A".to_string(),
                avg_nip: 0.0,
                avg_oversubscription: 0.0,
            };
        }
        let n = deals.len() as f64;
        let avg = |f: fn(&Deal) -> f64| deals.iter().map(|d| f(d)).sum::<f64>() / n;
        DealSummary {
            total_deals: deals.len(),
            total_raised: deals.iter().map(|d| u64::from(d.size)).sum(),
            avg_tenor: format!("{:.1}Y", round_to(avg(|d| f64::from(d.tenor_years())), 1)),
            avg_nip: round_to(avg(|d| f64::from(d.nip)), 1),
            avg_oversubscription: round_to(avg(|d| d.oversubscription), 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorVolume {
    pub sector: String,
    pub count: usize,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyVolume {
    pub currency: String,
    pub count: usize,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub total_deals: usize,
    pub total_volume: u64,
    pub avg_spread: i64,
    pub avg_nip: f64,
    pub by_sector: Vec<SectorVolume>,
    pub by_currency: Vec<CurrencyVolume>,
}

/// Count and volume per key in first-seen order, then largest volume first.
fn volume_by<'a>(deals: &[&'a Deal], key: impl Fn(&'a Deal) -> String) -> Vec<(String, usize, u64)> {
    let mut groups: Vec<(String, usize, u64)> = Vec::new();
    for deal in deals {
        let k = key(*deal);
        match groups.iter_mut().find(|g| g.0 == k) {
            Some(group) => {
                group.1 += 1;
                group.2 += u64::from(deal.size);
            }
            None => groups.push((k, 1, u64::from(deal.size))),
        }
    }
    groups.sort_by(|a, b| b.2.cmp(&a.2));
    groups
}

impl MarketSummary {
    pub fn of(data: &DcmDataset, deals: &[&Deal]) -> Self {
        if deals.is_empty() {
            return MarketSummary {
                total_deals: 0,
                total_volume: 0,
                avg_spread: 0,
                avg_nip: 0.0,
                by_sector: Vec::new(),
                by_currency: Vec::new(),
            };
        }
        let n = deals.len() as f64;
        let by_sector = volume_by(deals, |d| {
            data.sector_of(&d.issuer_id).unwrap_or("Unknown").to_string()
        })
        .into_iter()
        .map(|(sector, count, volume)| SectorVolume { sector, count, volume })
        .collect();
        let by_currency = volume_by(deals, |d| d.currency.clone())
            .into_iter()
            .map(|(currency, count, volume)| CurrencyVolume { currency, count, volume })
            .collect();

        MarketSummary {
            total_deals: deals.len(),
            total_volume: deals.iter().map(|d| u64::from(d.size)).sum(),
            avg_spread: (deals.iter().map(|d| f64::from(d.spread)).sum::<f64>() / n).round() as i64,
            avg_nip: round_to(deals.iter().map(|d| f64::from(d.nip)).sum::<f64>() / n, 1),
            by_sector,
            by_currency,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealSort {
    #[default]
    Date,
    Size,
    Spread,
}

/// Market-wide deal filter. Sector and currency compare case-insensitively; issuer
/// accepts an id or a name fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DealQuery {
    pub sector: Option<String>,
    pub currency: Option<String>,
    pub issuer: Option<String>,
    pub sort_by: DealSort,
    pub limit: Option<usize>,
}

pub(super) fn query<'a>(data: &'a DcmDataset, q: &DealQuery) -> Vec<&'a Deal> {
    let mut deals: Vec<&Deal> = data
        .deals()
        .iter()
        .filter(|d| {
            q.sector.as_deref().map_or(true, |s| {
                data.sector_of(&d.issuer_id)
                    .map_or(false, |sector| sector.eq_ignore_ascii_case(s))
            })
        })
        .filter(|d| q.currency.as_deref().map_or(true, |c| d.currency.eq_ignore_ascii_case(c)))
        .filter(|d| {
            q.issuer.as_deref().map_or(true, |i| {
                let needle = i.to_lowercase();
                d.issuer_id == i || d.issuer_name.to_lowercase().contains(&needle)
            })
        })
        .collect();

    match q.sort_by {
        DealSort::Date => deals.sort_by(|a, b| b.pricing_date.cmp(&a.pricing_date)),
        DealSort::Size => deals.sort_by(|a, b| b.size.cmp(&a.size)),
        DealSort::Spread => deals.sort_by(|a, b| b.spread.cmp(&a.spread)),
    }
    if let Some(limit) = q.limit.filter(|l| *l > 0) {
        deals.truncate(limit);
    }
    deals
}

struct DealRow {
    id: &'static str,
    issuer_id: &'static str,
    isin: &'static str,
    pricing: (i32, u32, u32),
    currency: &'static str,
    size: u32,
    tenor: &'static str,
    coupon: f64,
    reoffer: f64,
    spread: u32,
    nip: u32,
    format: Format,
    leads: [&'static str; 2],
    co_leads: &'static [&'static str],
    oversubscription: f64,
}

#[rustfmt::skip]
const DEALS: &[DealRow] = &[
    DealRow { id: "bmw-001", issuer_id: "bmw-ag", isin: "XS2725478901", pricing: (2025, 11, 7), currency: "EUR", size: 1000, tenor: "5Y", coupon: 3.25, reoffer: 99.75, spread: 85, nip: 5, format: Format::RegS, leads: ["Deutsche Bank", "BNP Paribas"], co_leads: &["HSBC", "Societe Generale"], oversubscription: 3.2 },
    DealRow { id: "bmw-002", issuer_id: "bmw-ag", isin: "XS2698234567", pricing: (2025, 6, 14), currency: "EUR", size: 750, tenor: "7Y", coupon: 3.50, reoffer: 99.50, spread: 95, nip: 8, format: Format::RegS, leads: ["Goldman Sachs", "Deutsche Bank"], co_leads: &["Credit Agricole", "ING"], oversubscription: 2.8 },
    DealRow { id: "bmw-003", issuer_id: "bmw-ag", isin: "XS2654321098", pricing: (2025, 2, 22), currency: "USD", size: 1500, tenor: "10Y", coupon: 4.125, reoffer: 99.25, spread: 120, nip: 10, format: Format::RegSAnd144A, leads: ["JP Morgan", "Morgan Stanley"], co_leads: &["Citibank", "Bank of America"], oversubscription: 4.1 },
    DealRow { id: "bmw-004", issuer_id: "bmw-ag", isin: "XS2598765432", pricing: (2024, 9, 12), currency: "EUR", size: 500, tenor: "3Y", coupon: 2.875, reoffer: 99.90, spread: 65, nip: 3, format: Format::RegS, leads: ["Barclays", "HSBC"], co_leads: &["Santander"], oversubscription: 2.5 },
    DealRow { id: "vw-001", issuer_id: "volkswagen-ag", isin: "XS2712345678", pricing: (2025, 10, 17), currency: "EUR", size: 1250, tenor: "5Y", coupon: 3.50, reoffer: 99.60, spread: 105, nip: 8, format: Format::RegS, leads: ["Deutsche Bank", "Goldman Sachs"], co_leads: &["BNP Paribas", "Credit Agricole"], oversubscription: 2.6 },
    DealRow { id: "vw-002", issuer_id: "volkswagen-ag", isin: "XS2687654321", pricing: (2025, 5, 10), currency: "EUR", size: 1000, tenor: "10Y", coupon: 4.00, reoffer: 99.40, spread: 135, nip: 12, format: Format::RegS, leads: ["JP Morgan", "Barclays"], co_leads: &["HSBC", "ING"], oversubscription: 2.2 },
    DealRow { id: "vw-003", issuer_id: "volkswagen-ag", isin: "XS2623456789", pricing: (2024, 12, 3), currency: "USD", size: 2000, tenor: "7Y", coupon: 4.375, reoffer: 99.50, spread: 145, nip: 15, format: Format::RegSAnd144A, leads: ["Morgan Stanley", "Citibank"], co_leads: &["Bank of America", "Wells Fargo"], oversubscription: 2.9 },
    DealRow { id: "mb-001", issuer_id: "mercedes-benz-ag", isin: "XS2734567890", pricing: (2025, 12, 4), currency: "EUR", size: 1500, tenor: "5Y", coupon: 3.125, reoffer: 99.80, spread: 80, nip: 4, format: Format::RegS, leads: ["BNP Paribas", "Deutsche Bank"], co_leads: &["Barclays", "HSBC"], oversubscription: 3.5 },
    DealRow { id: "mb-002", issuer_id: "mercedes-benz-ag", isin: "XS2701234567", pricing: (2025, 7, 22), currency: "EUR", size: 1000, tenor: "8Y", coupon: 3.625, reoffer: 99.55, spread: 100, nip: 7, format: Format::RegS, leads: ["Goldman Sachs", "JP Morgan"], co_leads: &["Credit Suisse", "UBS"], oversubscription: 3.0 },
    DealRow { id: "mb-003", issuer_id: "mercedes-benz-ag", isin: "XS2645678901", pricing: (2025, 3, 17), currency: "USD", size: 1750, tenor: "10Y", coupon: 4.00, reoffer: 99.30, spread: 115, nip: 9, format: Format::RegSAnd144A, leads: ["Morgan Stanley", "Bank of America"], co_leads: &["Citibank", "TD Securities"], oversubscription: 3.8 },
    DealRow { id: "porsche-001", issuer_id: "porsche-ag", isin: "XS2756789012", pricing: (2025, 9, 27), currency: "EUR", size: 750, tenor: "5Y", coupon: 3.375, reoffer: 99.70, spread: 90, nip: 6, format: Format::RegS, leads: ["Deutsche Bank", "Goldman Sachs"], co_leads: &["BNP Paribas"], oversubscription: 4.2 },
    DealRow { id: "porsche-002", issuer_id: "porsche-ag", isin: "XS2689012345", pricing: (2025, 4, 12), currency: "EUR", size: 500, tenor: "7Y", coupon: 3.75, reoffer: 99.45, spread: 110, nip: 10, format: Format::RegS, leads: ["JP Morgan", "Barclays"], co_leads: &["HSBC", "Credit Agricole"], oversubscription: 3.6 },
    DealRow { id: "siemens-001", issuer_id: "siemens-ag", isin: "XS2767890123", pricing: (2025, 11, 20), currency: "EUR", size: 1000, tenor: "10Y", coupon: 3.00, reoffer: 99.85, spread: 55, nip: 3, format: Format::RegS, leads: ["Deutsche Bank", "BNP Paribas"], co_leads: &["Societe Generale", "Credit Agricole"], oversubscription: 4.5 },
    DealRow { id: "siemens-002", issuer_id: "siemens-ag", isin: "XS2634567890", pricing: (2025, 1, 24), currency: "EUR", size: 750, tenor: "5Y", coupon: 2.75, reoffer: 99.90, spread: 45, nip: 2, format: Format::RegS, leads: ["Goldman Sachs", "JP Morgan"], co_leads: &["Barclays", "HSBC"], oversubscription: 5.0 },
    DealRow { id: "basf-001", issuer_id: "basf-se", isin: "XS2778901234", pricing: (2025, 8, 7), currency: "EUR", size: 1250, tenor: "7Y", coupon: 3.25, reoffer: 99.65, spread: 75, nip: 5, format: Format::RegS, leads: ["Deutsche Bank", "Barclays"], co_leads: &["BNP Paribas", "ING"], oversubscription: 3.1 },
    DealRow { id: "total-001", issuer_id: "totalenergies-se", isin: "XS2789012345", pricing: (2025, 10, 3), currency: "EUR", size: 2000, tenor: "10Y", coupon: 2.875, reoffer: 99.90, spread: 50, nip: 2, format: Format::RegS, leads: ["BNP Paribas", "Societe Generale"], co_leads: &["Credit Agricole", "HSBC"], oversubscription: 4.8 },
    DealRow { id: "shell-001", issuer_id: "shell-plc", isin: "XS2790123456", pricing: (2025, 9, 10), currency: "USD", size: 2500, tenor: "10Y", coupon: 4.25, reoffer: 99.75, spread: 65, nip: 4, format: Format::RegSAnd144A, leads: ["JP Morgan", "Citibank"], co_leads: &["Bank of America", "Goldman Sachs"], oversubscription: 4.0 },
    DealRow { id: "lvmh-001", issuer_id: "lvmh-se", isin: "XS2801234567", pricing: (2025, 11, 27), currency: "EUR", size: 1500, tenor: "8Y", coupon: 2.625, reoffer: 99.85, spread: 40, nip: 2, format: Format::RegS, leads: ["BNP Paribas", "Goldman Sachs"], co_leads: &["Societe Generale", "Credit Agricole"], oversubscription: 5.5 },
];

/// Materialise the deal table. Announcement is two days before pricing and settlement
/// seven days after.
pub(super) fn seed(issuers: &[Issuer]) -> Vec<Deal> {
    DEALS
        .iter()
        .filter_map(|row| {
            let (y, m, d) = row.pricing;
            let pricing_date = NaiveDate::from_ymd_opt(y, m, d)?;
            let issuer_name = issuers
                .iter()
                .find(|i| i.id == row.issuer_id)
                .map(|i| i.short_name.clone())?;
            Some(Deal {
                id: row.id.to_string(),
                issuer_id: row.issuer_id.to_string(),
                issuer_name,
                isin: row.isin.to_string(),
                announce_date: pricing_date - Duration::days(2),
                pricing_date,
                settle_date: pricing_date + Duration::days(7),
                currency: row.currency.to_string(),
                size: row.size,
                tenor: row.tenor.to_string(),
                coupon: row.coupon,
                reoffer: row.reoffer,
                spread: row.spread,
                nip: row.nip,
                format: row.format,
                seniority: Seniority::Senior,
                leads: row.leads.iter().map(|s| s.to_string()).collect(),
                co_leads: row.co_leads.iter().map(|s| s.to_string()).collect(),
                oversubscription: row.oversubscription,
            })
        })
        .collect()
}
