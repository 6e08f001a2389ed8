use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::aggregate::{count_by, count_by_desc, count_where, format_currency, mean, round_to, sum};
use super::{
    contains_ignore_case, equals, parse_filters, to_records, unknown_aggregation, ChartAggregation,
    ChartType, Column, DataSource,
};
use crate::errors::AgentResult;

const COUNTERPARTIES: &[&str] = &[
    "Goldman Sachs", "JP Morgan", "Morgan Stanley", "Citibank", "Bank of America", "Deutsche Bank",
    "Barclays", "Credit Suisse", "UBS", "HSBC", "BNP Paribas", "Societe Generale", "RBC Capital",
    "TD Securities", "Wells Fargo",
];

const TRADERS: &[&str] = &[
    "John Smith", "Sarah Johnson", "Michael Chen", "Emily Davis", "Robert Wilson",
    "Jennifer Brown", "David Lee", "Lisa Anderson", "James Taylor", "Maria Garcia",
];

struct ListedBond {
    name: &'static str,
    isin: &'static str,
    cusip: &'static str,
    base_price: f64,
    base_yield: f64,
}

const fn bond(name: &'static str, isin: &'static str, cusip: &'static str, base_price: f64, base_yield: f64) -> ListedBond {
    ListedBond { name, isin, cusip, base_price, base_yield }
}

const BONDS: &[ListedBond] = &[
    bond("US Treasury 10Y", "US912810TM17", "912810TM1", 98.5, 4.25),
    bond("US Treasury 5Y", "US91282CGV27", "91282CGV2", 99.2, 4.10),
    bond("US Treasury 2Y", "US91282CHD27", "91282CHD2", 99.8, 4.50),
    bond("US Treasury 30Y", "US912810TQ31", "912810TQ3", 95.5, 4.45),
    bond("Germany Bund 10Y", "DE0001102580", "D01102580", 97.2, 2.35),
    bond("UK Gilt 10Y", "GB00BDRHNP05", "G00BDRHP0", 96.8, 4.15),
    bond("Japan JGB 10Y", "JP1103551M19", "J11035519", 99.5, 0.75),
    bond("Apple Inc 3.85% 2043", "US037833DT49", "037833DT4", 92.3, 4.55),
    bond("Microsoft 2.4% 2026", "US594918BW92", "594918BW9", 97.8, 3.20),
    bond("Amazon 3.15% 2027", "US023135BT85", "023135BT8", 96.5, 3.95),
    bond("Google 1.1% 2025", "US02079KAE47", "02079KAE4", 98.9, 2.85),
    bond("JPM 4.125% 2026", "US46625HRL05", "46625HRL0", 99.1, 4.35),
    bond("Goldman Sachs 3.5% 2025", "US38141GWK93", "38141GWK9", 98.2, 4.15),
    bond("Verizon 4.5% 2033", "US92343VGH60", "92343VGH6", 94.5, 5.10),
    bond("AT&T 3.65% 2028", "US00206RKH49", "00206RKH4", 95.8, 4.45),
];

const COLUMNS: &[Column] = &[
    Column { key: "id", label: "ID" },
    Column { key: "tradeDate", label: "Trade Date" },
    Column { key: "bondName", label: "Bond" },
    Column { key: "direction", label: "Dir" },
    Column { key: "quantity", label: "Qty" },
    Column { key: "price", label: "Price" },
    Column { key: "yield", label: "Yield" },
    Column { key: "counterparty", label: "Counterparty" },
    Column { key: "status", label: "Status" },
    Column { key: "notionalValue", label: "Notional" },
];

const AGGREGATIONS: &[ChartAggregation] = &[
    ChartAggregation { key: "byCounterparty", label: "Trades by Counterparty", x_key: "name", y_key: "count", recommended_type: ChartType::Bar },
    ChartAggregation { key: "byBond", label: "Trades by Bond", x_key: "name", y_key: "count", recommended_type: ChartType::Bar },
    ChartAggregation { key: "byStatus", label: "Trades by Status", x_key: "name", y_key: "count", recommended_type: ChartType::Pie },
    ChartAggregation { key: "dailyVolume", label: "Daily Volume", x_key: "date", y_key: "volume", recommended_type: ChartType::Line },
    ChartAggregation { key: "buyVsSell", label: "Buy vs Sell", x_key: "name", y_key: "count", recommended_type: ChartType::Pie },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Pending,
    Settled,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BondTrade {
    pub id: String,
    pub trade_date: NaiveDate,
    pub settlement_date: NaiveDate,
    pub bond_name: String,
    pub isin: String,
    pub cusip: String,
    pub direction: Direction,
    pub quantity: u64,
    pub price: f64,
    #[serde(rename = "yield")]
    pub yield_pct: f64,
    pub counterparty: String,
    pub trader: String,
    pub status: TradeStatus,
    pub currency: String,
    pub notional_value: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct TradeFilter {
    bond_name: Option<String>,
    isin: Option<String>,
    direction: Option<Direction>,
    counterparty: Option<String>,
    trader: Option<String>,
    status: Option<TradeStatus>,
    from_date: Option<NaiveDate>,
    to_date: Option<NaiveDate>,
    min_notional: Option<f64>,
    max_notional: Option<f64>,
}

impl TradeFilter {
    fn matches(&self, t: &BondTrade) -> bool {
        contains_ignore_case(&t.bond_name, &self.bond_name)
            && equals(&t.isin, &self.isin)
            && self.direction.map_or(true, |d| t.direction == d)
            && contains_ignore_case(&t.counterparty, &self.counterparty)
            && contains_ignore_case(&t.trader, &self.trader)
            && self.status.map_or(true, |s| t.status == s)
            && self.from_date.map_or(true, |from| t.trade_date >= from)
            && self.to_date.map_or(true, |to| t.trade_date <= to)
            && self.min_notional.map_or(true, |min| t.notional_value as f64 >= min)
            && self.max_notional.map_or(true, |max| t.notional_value as f64 <= max)
    }
}

fn currency_for(isin: &str) -> &'static str {
    match isin.get(..2) {
        Some("DE") => "EUR",
        Some("GB") => "GBP",
        Some("JP") => "JPY",
        _ => "USD",
    }
}

pub struct BondTrades {
    trades: Vec<BondTrade>,
}

impl BondTrades {
    pub const NAME: &'static str = "bond_trades";

    /// One hundred trades over the thirty days up to `today`, newest first.
    pub fn generate(today: NaiveDate, seed: u64) -> Self {
        const STATUSES: [TradeStatus; 6] = [
            TradeStatus::Pending,
            TradeStatus::Settled,
            TradeStatus::Settled,
            TradeStatus::Settled,
            TradeStatus::Cancelled,
            TradeStatus::Failed,
        ];

        let mut rng = StdRng::seed_from_u64(seed);
        let mut trades: Vec<BondTrade> = (1..=100)
            .map(|i| {
                let bond = &BONDS[rng.gen_range(0..BONDS.len())];
                let trade_date = today - Duration::days(rng.gen_range(0..30));
                let price = round_to(bond.base_price + rng.gen_range(-1.0..1.0), 3);
                let quantity = rng.gen_range(1..=50u64) * 100_000;
                let direction = if rng.gen_bool(0.5) { Direction::Buy } else { Direction::Sell };
                BondTrade {
                    id: format!("TRD-{:05}", i),
                    trade_date,
                    settlement_date: trade_date + Duration::days(2),
                    bond_name: bond.name.to_string(),
                    isin: bond.isin.to_string(),
                    cusip: bond.cusip.to_string(),
                    direction,
                    quantity,
                    price,
                    yield_pct: round_to(bond.base_yield + rng.gen_range(-0.1..0.1), 3),
                    counterparty: COUNTERPARTIES.choose(&mut rng).copied().unwrap_or_default().to_string(),
                    trader: TRADERS.choose(&mut rng).copied().unwrap_or_default().to_string(),
                    status: STATUSES[rng.gen_range(0..STATUSES.len())],
                    currency: currency_for(bond.isin).to_string(),
                    notional_value: (quantity as f64 * price / 100.0).round() as u64,
                }
            })
            .collect();

        trades.sort_by(|a, b| b.trade_date.cmp(&a.trade_date));
        Self { trades }
    }

    pub fn trades(&self) -> &[BondTrade] {
        &self.trades
    }
}

impl DataSource for BondTrades {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Bond trading data including Treasury, corporate, and sovereign bonds with counterparty and status information"
    }

    fn filter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "bondName": {"type": "string", "description": "Filter by bond name (partial match)"},
                "isin": {"type": "string", "description": "Filter by exact ISIN"},
                "direction": {"type": "string", "enum": ["BUY", "SELL"]},
                "counterparty": {"type": "string", "description": "Filter by counterparty name"},
                "trader": {"type": "string", "description": "Filter by trader name"},
                "status": {"type": "string", "enum": ["PENDING", "SETTLED", "CANCELLED", "FAILED"]},
                "fromDate": {"type": "string", "description": "Filter from date (YYYY-MM-DD)"},
                "toDate": {"type": "string", "description": "Filter to date (YYYY-MM-DD)"},
                "minNotional": {"type": "number"},
                "maxNotional": {"type": "number"}
            }
        })
    }

    fn columns(&self) -> &[Column] {
        COLUMNS
    }

    fn chart_aggregations(&self) -> &[ChartAggregation] {
        AGGREGATIONS
    }

    fn query(&self, filters: &Value) -> AgentResult<Vec<Value>> {
        let filter: TradeFilter = parse_filters(Self::NAME, filters)?;
        Ok(to_records(self.trades.iter().filter(|t| filter.matches(t))))
    }

    fn aggregate(&self, records: &[Value], kind: &str) -> AgentResult<Vec<Value>> {
        match kind {
            "byCounterparty" => Ok(top_ten(count_by_desc(records, "counterparty"))),
            "byBond" => Ok(top_ten(count_by_desc(records, "bondName"))),
            "byStatus" => Ok(count_by(records, "status")),
            "dailyVolume" => Ok(daily_volume(records)),
            "buyVsSell" => Ok(vec![
                json!({"name": "Buy", "count": count_where(records, "direction", "BUY")}),
                json!({"name": "Sell", "count": count_where(records, "direction", "SELL")}),
            ]),
            _ => Err(unknown_aggregation(Self::NAME, kind)),
        }
    }

    fn summary(&self, records: &[Value]) -> Map<String, Value> {
        let mut summary = Map::new();
        summary.insert("totalTrades".into(), json!(records.len()));
        summary.insert("totalNotional".into(), json!(format_currency(sum(records, "notionalValue"))));
        summary.insert("buyCount".into(), json!(count_where(records, "direction", "BUY")));
        summary.insert("sellCount".into(), json!(count_where(records, "direction", "SELL")));
        summary.insert("avgPrice".into(), json!(round_to(mean(records, "price"), 2)));
        summary.insert("avgYield".into(), json!(format!("{:.2}%", mean(records, "yield"))));
        summary
    }
}

fn top_ten(mut points: Vec<Value>) -> Vec<Value> {
    points.truncate(10);
    points
}

/// Notional per trade date in millions, oldest first.
fn daily_volume(records: &[Value]) -> Vec<Value> {
    let mut days: std::collections::BTreeMap<String, f64> = std::collections::BTreeMap::new();
    for record in records {
        if let Some(date) = record.get("tradeDate").and_then(Value::as_str) {
            *days.entry(date.to_string()).or_default() +=
                record.get("notionalValue").and_then(Value::as_f64).unwrap_or(0.0);
        }
    }
    days.into_iter()
        .map(|(date, volume)| json!({"date": date, "volume": (volume / 1_000_000.0).round() as i64}))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trades() -> BondTrades {
        BondTrades::generate(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(), 11)
    }

    #[test]
    fn test_trades_are_recent_and_consistent() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let source = trades();
        assert_eq!(source.trades().len(), 100);
        for (prev, next) in source.trades().iter().zip(source.trades().iter().skip(1)) {
            assert!(prev.trade_date >= next.trade_date);
        }
        for t in source.trades() {
            assert!(t.trade_date <= today && t.trade_date > today - Duration::days(30));
            assert_eq!(t.settlement_date, t.trade_date + Duration::days(2));
            assert_eq!(t.quantity % 100_000, 0);
            assert_eq!(t.currency, currency_for(&t.isin));
        }
    }

    #[test]
    fn test_date_range_and_counterparty_filters() {
        let source = trades();
        let rows = source
            .query(&json!({"fromDate": "2025-03-20", "counterparty": "bank"}))
            .unwrap();
        for row in &rows {
            assert!(row["tradeDate"].as_str().unwrap() >= "2025-03-20");
            assert!(row["counterparty"].as_str().unwrap().to_lowercase().contains("bank"));
        }
    }

    #[test]
    fn test_daily_volume_is_sorted_by_date() {
        let source = trades();
        let rows = source.query(&Value::Null).unwrap();
        let points = source.aggregate(&rows, "dailyVolume").unwrap();
        let dates: Vec<&str> = points.iter().map(|p| p["date"].as_str().unwrap()).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn test_buy_vs_sell_adds_up() {
        let source = trades();
        let rows = source.query(&Value::Null).unwrap();
        let points = source.aggregate(&rows, "buyVsSell").unwrap();
        let total: u64 = points.iter().map(|p| p["count"].as_u64().unwrap()).sum();
        assert_eq!(total, 100);
        assert!(source.aggregate(&rows, "byWeather").is_err());
    }
}
