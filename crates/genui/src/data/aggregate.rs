use std::collections::HashMap;

use serde_json::{json, Value};

fn field_str<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

fn field_f64(record: &Value, field: &str) -> f64 {
    record.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Group keys in first-seen order so ties stay stable after sorting.
fn group<F>(records: &[Value], field: &str, mut fold: F) -> Vec<(String, f64, usize)>
where
    F: FnMut(&Value) -> f64,
{
    let mut order: Vec<(String, f64, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records {
        let Some(key) = field_str(record, field) else {
            continue;
        };
        let i = *index.entry(key.to_string()).or_insert_with(|| {
            order.push((key.to_string(), 0.0, 0));
            order.len() - 1
        });
        order[i].1 += fold(record);
        order[i].2 += 1;
    }
    order
}

/// `{name, count}` points per distinct value of `field`, in first-seen order.
pub fn count_by(records: &[Value], field: &str) -> Vec<Value> {
    group(records, field, |_| 0.0)
        .into_iter()
        .map(|(name, _, count)| json!({"name": name, "count": count}))
        .collect()
}

/// Like [`count_by`], largest groups first.
pub fn count_by_desc(records: &[Value], field: &str) -> Vec<Value> {
    let mut points = count_by(records, field);
    points.sort_by_key(|p| std::cmp::Reverse(p["count"].as_u64().unwrap_or(0)));
    points
}

/// Sum of `value_field` per `field`, largest first, as `{name, <label>}` points.
pub fn sum_by(records: &[Value], field: &str, value_field: &str, label: &str) -> Vec<Value> {
    let mut groups = group(records, field, |r| field_f64(r, value_field));
    groups.sort_by(|a, b| b.1.total_cmp(&a.1));
    groups
        .into_iter()
        .map(|(name, total, _)| json!({"name": name, label: total.round() as i64}))
        .collect()
}

/// Mean of `value_field` per `field`, largest first, as `{name, <label>}` points.
pub fn avg_by(records: &[Value], field: &str, value_field: &str, label: &str) -> Vec<Value> {
    let mut groups: Vec<(String, f64)> = group(records, field, |r| field_f64(r, value_field))
        .into_iter()
        .map(|(name, total, count)| (name, (total / count as f64).round()))
        .collect();
    groups.sort_by(|a, b| b.1.total_cmp(&a.1));
    groups
        .into_iter()
        .map(|(name, avg)| json!({"name": name, label: avg as i64}))
        .collect()
}

pub fn count_where(records: &[Value], field: &str, expected: &str) -> usize {
    records
        .iter()
        .filter(|r| field_str(r, field) == Some(expected))
        .count()
}

pub fn sum(records: &[Value], field: &str) -> f64 {
    records.iter().map(|r| field_f64(r, field)).sum()
}

pub fn mean(records: &[Value], field: &str) -> f64 {
    if records.is_empty() {
        0.0
    } else {
        sum(records, field) / records.len() as f64
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Group digits in threes with commas, keeping up to two decimals ("1,234,567.5").
pub fn format_number(value: f64) -> String {
    let rounded = round_to(value, 2);
    let negative = rounded < 0.0;
    let whole = rounded.abs().trunc() as u64;
    let cents = ((rounded.abs() - whole as f64) * 100.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if cents > 0 {
        let fraction = format!("{:02}", cents);
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out
}

pub fn format_currency(value: f64) -> String {
    format!("${}", format_number(value))
}
