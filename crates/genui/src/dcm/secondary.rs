use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use super::{char_code_sum, lcg, round_to, Deal};

/// Longest post-pricing window the generator will produce.
pub const MAX_DAYS: u32 = 90;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformancePoint {
    pub isin: String,
    pub date: NaiveDate,
    pub price: f64,
    pub spread: i64,
    pub yield_to_maturity: f64,
    pub volume_traded: i64,
    pub days_from_pricing: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub current_spread: i64,
    pub issue_spread: i64,
    pub drift: i64,
    pub current_price: f64,
    pub issue_price: f64,
    pub price_change: f64,
    pub avg_daily_volume: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurvePoint {
    pub tenor: &'static str,
    pub spread: i64,
    #[serde(rename = "yield")]
    pub yield_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorCurve {
    pub sector: String,
    pub rating: String,
    pub benchmark: &'static str,
    pub curve: Vec<CurvePoint>,
}

/// Weekday trading history for the first `days` calendar days after pricing.
///
/// Bonds tighten and trade heavily in the first week, then drift.
pub fn performance_series(deal: &Deal, days: u32) -> Vec<PerformancePoint> {
    let seed = char_code_sum(&deal.isin);
    let rng = |n: u64| lcg(seed, n) - 0.5;

    let mut price = deal.reoffer;
    let mut spread = i64::from(deal.spread);
    let base_volume = f64::from(deal.size) * 0.02;

    let mut series = Vec::new();
    for i in 0..=days.min(MAX_DAYS) {
        let date = deal.pricing_date + Duration::days(i64::from(i));
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        let n = u64::from(i);
        let early = i < 7;

        price = round_to(price + rng(n) * 0.3 + if early { 0.05 } else { 0.0 }, 2);
        let spread_change = rng(n + 100) * 2.0 - if early { 1.0 } else { 0.0 };
        spread = ((spread as f64 + spread_change).round() as i64).max(10);

        let multiplier = match i {
            0..=6 => 3.0,
            7..=13 => 2.0,
            _ => 1.0,
        };
        series.push(PerformancePoint {
            isin: deal.isin.clone(),
            date,
            price,
            spread,
            yield_to_maturity: round_to(deal.coupon + (100.0 - price) / 5.0, 2),
            volume_traded: (base_volume * multiplier * (0.5 + rng(n + 200))).round() as i64,
            days_from_pricing: i,
        });
    }
    series
}

/// Latest 30-day spread minus the issue spread, in basis points.
pub fn spread_drift(deal: &Deal) -> i64 {
    performance_series(deal, 30)
        .last()
        .map_or(0, |p| p.spread - i64::from(deal.spread))
}

pub fn performance_summary(deal: &Deal) -> Option<PerformanceSummary> {
    let series = performance_series(deal, 30);
    let latest = series.last()?;
    let avg_volume =
        series.iter().map(|p| p.volume_traded as f64).sum::<f64>() / series.len() as f64;
    let issue_spread = i64::from(deal.spread);

    Some(PerformanceSummary {
        current_spread: latest.spread,
        issue_spread,
        drift: latest.spread - issue_spread,
        current_price: latest.price,
        issue_price: deal.reoffer,
        price_change: round_to(latest.price - deal.reoffer, 2),
        avg_daily_volume: avg_volume.round() as i64,
    })
}

const TENORS: [(&str, f64); 9] = [
    ("1Y", 0.6),
    ("2Y", 0.7),
    ("3Y", 0.8),
    ("5Y", 1.0),
    ("7Y", 1.15),
    ("10Y", 1.3),
    ("15Y", 1.45),
    ("20Y", 1.55),
    ("30Y", 1.65),
];

fn rating_base(rating: &str) -> f64 {
    match rating {
        "AAA" => 20.0,
        "AA+" => 30.0,
        "AA" => 35.0,
        "AA-" => 45.0,
        "A+" => 55.0,
        "A" => 70.0,
        "A-" => 85.0,
        "BBB+" => 100.0,
        "BBB" => 120.0,
        "BBB-" => 150.0,
        _ => 80.0,
    }
}

fn sector_adjustment(sector: &str) -> f64 {
    match sector {
        "Automobiles" => 15.0,
        "Industrials" => 5.0,
        "Energy" => 10.0,
        "Chemicals" => 8.0,
        "Consumer Goods" => -5.0,
        _ => 0.0,
    }
}

/// Indicative spread curve for a sector and rating bucket.
pub fn sector_curve(sector: &str, rating: &str) -> SectorCurve {
    let seed = char_code_sum(sector) + char_code_sum(rating);
    let base = rating_base(rating) + sector_adjustment(sector);

    let curve = TENORS
        .iter()
        .enumerate()
        .map(|(i, &(tenor, multiplier))| {
            let n = i as u64;
            CurvePoint {
                tenor,
                spread: (base * multiplier + lcg(seed, n) * 10.0).round() as i64,
                yield_pct: round_to(3.0 + i as f64 * 0.15 + lcg(seed, n + 10) * 0.2, 2),
            }
        })
        .collect();

    SectorCurve {
        sector: sector.to_string(),
        rating: rating.to_string(),
        benchmark: if rating.starts_with('A') { "EUR Mid-Swap" } else { "EUR Bund" },
        curve,
    }
}
