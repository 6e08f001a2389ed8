use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::aggregate::{count_by, count_by_desc, count_where, format_currency, round_to};
use super::{
    contains_ignore_case, equals, parse_filters, to_records, unknown_aggregation, ChartAggregation,
    ChartType, Column, DataSource,
};
use crate::errors::AgentResult;

/// Category, then each subcategory with its product names.
const CATALOG: &[(&str, [(&str, [&str; 5]); 5])] = &[
    ("Electronics", [
        ("Laptops", ["ProBook 15", "UltraSlim 14", "WorkStation X", "DevBook Pro", "Budget Laptop"]),
        ("Phones", ["SmartPhone Pro", "Galaxy Plus", "Business Phone", "Budget Mobile", "Secure Device"]),
        ("Tablets", ["TabPro 12", "Mini Tab 8", "Drawing Tablet", "Kids Tablet", "Business Tab"]),
        ("Accessories", ["USB Hub", "Wireless Mouse", "Keyboard Pro", "Monitor Stand", "Webcam HD"]),
        ("Audio", ["Headphones Pro", "Earbuds Wireless", "Conference Speaker", "Microphone USB", "Soundbar"]),
    ]),
    ("Furniture", [
        ("Desks", ["Standing Desk", "Executive Desk", "Corner Desk", "Simple Desk", "Adjustable Desk"]),
        ("Chairs", ["Ergonomic Chair", "Executive Chair", "Task Chair", "Guest Chair", "Stool"]),
        ("Storage", ["Filing Cabinet", "Bookshelf", "Storage Box", "Drawer Unit", "Locker"]),
        ("Lighting", ["Desk Lamp", "Floor Lamp", "LED Panel", "Task Light", "Ring Light"]),
        ("Decor", ["Plant", "Wall Art", "Clock", "Whiteboard", "Cork Board"]),
    ]),
    ("Office", [
        ("Supplies", ["Stapler Set", "Paper Clips", "Tape Dispenser", "Scissors", "Ruler Set"]),
        ("Paper", ["Copy Paper", "Notebook", "Sticky Notes", "Index Cards", "Labels"]),
        ("Writing", ["Pen Set", "Marker Pack", "Highlighters", "Pencils", "Erasers"]),
        ("Organization", ["Binder", "Folder Pack", "Desk Organizer", "File Box", "Label Maker"]),
        ("Tech", ["Calculator", "Power Strip", "Extension Cord", "Surge Protector", "Battery Pack"]),
    ]),
    ("Software", [
        ("Productivity", ["Office Suite", "Project Manager", "Time Tracker", "Note App", "Calendar Pro"]),
        ("Security", ["Antivirus Pro", "VPN Service", "Password Manager", "Backup Solution", "Firewall"]),
        ("Design", ["Photo Editor", "Vector Graphics", "Video Editor", "Audio Suite", "3D Modeler"]),
        ("Development", ["IDE Pro", "Database Tool", "API Client", "Version Control", "Testing Suite"]),
        ("Communication", ["Video Chat", "Team Messenger", "Email Client", "Webinar Tool", "Voice Chat"]),
    ]),
];

const SUPPLIERS: &[&str] = &[
    "TechSupply Co", "Global Distributors", "Office Depot", "Amazon Business", "Staples", "CDW",
    "Insight", "SHI", "Connection", "PCM", "Zones", "Ingram Micro",
];

const COLUMNS: &[Column] = &[
    Column { key: "id", label: "ID" },
    Column { key: "sku", label: "SKU" },
    Column { key: "name", label: "Name" },
    Column { key: "category", label: "Category" },
    Column { key: "price", label: "Price" },
    Column { key: "stock", label: "Stock" },
    Column { key: "supplier", label: "Supplier" },
    Column { key: "status", label: "Status" },
];

const AGGREGATIONS: &[ChartAggregation] = &[
    ChartAggregation { key: "byCategory", label: "Products by Category", x_key: "name", y_key: "count", recommended_type: ChartType::Bar },
    ChartAggregation { key: "byStatus", label: "Products by Status", x_key: "name", y_key: "count", recommended_type: ChartType::Pie },
    ChartAggregation { key: "bySupplier", label: "Products by Supplier", x_key: "name", y_key: "count", recommended_type: ChartType::Bar },
    ChartAggregation { key: "valueByCategory", label: "Inventory Value by Category", x_key: "name", y_key: "value", recommended_type: ChartType::Bar },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
    Discontinued,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub price: f64,
    pub cost: f64,
    pub stock: u32,
    pub supplier: String,
    pub status: StockStatus,
    pub last_restocked: NaiveDate,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ProductFilter {
    name: Option<String>,
    sku: Option<String>,
    category: Option<String>,
    subcategory: Option<String>,
    supplier: Option<String>,
    status: Option<StockStatus>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    min_stock: Option<f64>,
    max_stock: Option<f64>,
}

impl ProductFilter {
    fn matches(&self, p: &Product) -> bool {
        let stock = f64::from(p.stock);
        contains_ignore_case(&p.name, &self.name)
            && contains_ignore_case(&p.sku, &self.sku)
            && equals(&p.category, &self.category)
            && equals(&p.subcategory, &self.subcategory)
            && contains_ignore_case(&p.supplier, &self.supplier)
            && self.status.map_or(true, |s| p.status == s)
            && self.min_price.map_or(true, |min| p.price >= min)
            && self.max_price.map_or(true, |max| p.price <= max)
            && self.min_stock.map_or(true, |min| stock >= min)
            && self.max_stock.map_or(true, |max| stock <= max)
    }
}

fn abbreviate(s: &str) -> String {
    s.chars().take(3).collect::<String>().to_uppercase()
}

pub struct Products {
    products: Vec<Product>,
}

impl Products {
    pub const NAME: &'static str = "products";

    /// Seventy-five products sorted by category then name.
    pub fn generate(today: NaiveDate, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut products: Vec<Product> = (1..=75)
            .map(|i| {
                let (category, subcategories) = &CATALOG[rng.gen_range(0..CATALOG.len())];
                let (subcategory, names) = &subcategories[rng.gen_range(0..subcategories.len())];
                let base_name = names.choose(&mut rng).copied().unwrap_or("Product");

                let price = round_to(rng.gen_range(10.0..510.0), 2);
                let cost = round_to(price * rng.gen_range(0.4..0.7), 2);
                let stock = rng.gen_range(0..200u32);
                let status = match stock {
                    0 => StockStatus::OutOfStock,
                    1..=9 => StockStatus::LowStock,
                    _ if rng.gen_bool(0.05) => StockStatus::Discontinued,
                    _ => StockStatus::InStock,
                };

                Product {
                    id: format!("PRD-{:04}", i),
                    sku: format!("{}-{}-{:04}", abbreviate(category), abbreviate(subcategory), i),
                    name: format!("{} {}", base_name, rng.gen_range(0..100)),
                    category: category.to_string(),
                    subcategory: subcategory.to_string(),
                    price,
                    cost,
                    stock,
                    supplier: SUPPLIERS.choose(&mut rng).copied().unwrap_or_default().to_string(),
                    status,
                    last_restocked: today - Duration::days(rng.gen_range(0..60)),
                }
            })
            .collect();

        products.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        Self { products }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }
}

/// Inventory value (price times stock) per record.
fn with_value(records: &[Value]) -> Vec<Value> {
    records
        .iter()
        .map(|r| {
            let price = r.get("price").and_then(Value::as_f64).unwrap_or(0.0);
            let stock = r.get("stock").and_then(Value::as_f64).unwrap_or(0.0);
            json!({"category": r.get("category"), "value": price * stock})
        })
        .collect()
}

impl DataSource for Products {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Product inventory with categories, pricing, stock levels, and supplier information"
    }

    fn filter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Filter by product name"},
                "sku": {"type": "string", "description": "Filter by SKU"},
                "category": {"type": "string", "enum": ["Electronics", "Furniture", "Office", "Software"]},
                "subcategory": {"type": "string", "description": "Filter by subcategory"},
                "supplier": {"type": "string", "description": "Filter by supplier"},
                "status": {"type": "string", "enum": ["IN_STOCK", "LOW_STOCK", "OUT_OF_STOCK", "DISCONTINUED"]},
                "minPrice": {"type": "number", "description": "Minimum price"},
                "maxPrice": {"type": "number", "description": "Maximum price"},
                "minStock": {"type": "number", "description": "Minimum stock level"},
                "maxStock": {"type": "number", "description": "Maximum stock level"}
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
        let filter: ProductFilter = parse_filters(Self::NAME, filters)?;
        Ok(to_records(self.products.iter().filter(|p| filter.matches(p))))
    }

    fn aggregate(&self, records: &[Value], kind: &str) -> AgentResult<Vec<Value>> {
        match kind {
            "byCategory" => Ok(count_by_desc(records, "category")),
            "byStatus" => Ok(count_by(records, "status")),
            "bySupplier" => {
                let mut points = count_by_desc(records, "supplier");
                points.truncate(10);
                Ok(points)
            }
            "valueByCategory" => Ok(super::aggregate::sum_by(
                &with_value(records),
                "category",
                "value",
                "value",
            )),
            _ => Err(unknown_aggregation(Self::NAME, kind)),
        }
    }

    fn summary(&self, records: &[Value]) -> Map<String, Value> {
        let total_stock: u64 = records
            .iter()
            .filter_map(|r| r.get("stock").and_then(Value::as_u64))
            .sum();
        let total_value: f64 = with_value(records)
            .iter()
            .filter_map(|r| r["value"].as_f64())
            .sum();

        let mut summary = Map::new();
        summary.insert("totalProducts".into(), json!(records.len()));
        summary.insert("totalStock".into(), json!(total_stock));
        summary.insert("totalValue".into(), json!(format_currency(total_value)));
        summary.insert("lowStockCount".into(), json!(count_where(records, "status", "LOW_STOCK")));
        summary.insert("outOfStockCount".into(), json!(count_where(records, "status", "OUT_OF_STOCK")));
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> Products {
        Products::generate(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(), 5)
    }

    #[test]
    fn test_status_follows_stock_level() {
        for p in source().products() {
            match p.stock {
                0 => assert_eq!(p.status, StockStatus::OutOfStock),
                1..=9 => assert_eq!(p.status, StockStatus::LowStock),
                _ => assert!(matches!(p.status, StockStatus::InStock | StockStatus::Discontinued)),
            }
            assert!(p.cost < p.price);
            assert!(p.sku.ends_with(&p.id[4..]));
        }
    }

    #[test]
    fn test_price_range_filter() {
        let source = source();
        let rows = source.query(&json!({"minPrice": 100, "maxPrice": 200})).unwrap();
        assert!(rows
            .iter()
            .all(|r| (100.0..=200.0).contains(&r["price"].as_f64().unwrap())));
    }

    #[test]
    fn test_value_by_category_is_descending() {
        let source = source();
        let rows = source.query(&Value::Null).unwrap();
        let points = source.aggregate(&rows, "valueByCategory").unwrap();
        let values: Vec<i64> = points.iter().map(|p| p["value"].as_i64().unwrap()).collect();
        assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_total_value_is_price_times_stock() {
        let source = source();
        let rows = source.query(&Value::Null).unwrap();
        let expected: f64 = source
            .products()
            .iter()
            .map(|p| p.price * f64::from(p.stock))
            .sum();
        assert_eq!(source.summary(&rows)["totalValue"], json!(format_currency(expected)));
    }

    #[test]
    fn test_summary_counts() {
        let source = source();
        let rows = source.query(&json!({"status": "OUT_OF_STOCK"})).unwrap();
        let summary = source.summary(&rows);
        assert_eq!(summary["outOfStockCount"], json!(rows.len()));
        assert_eq!(summary["totalStock"], json!(0));
    }
}
