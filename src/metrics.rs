use std::collections::HashMap;

use serde_json::Value;

use crate::models::{CategoryCount, SellerMetrics};

const PRICE_BANDS: [(&str, f64); 4] = [
    ("Under $50", 50.0),
    ("$50 - $200", 200.0),
    ("$200 - $500", 500.0),
    ("$500+", f64::INFINITY),
];

/// Product counts per category, largest first. Products without a category
/// are grouped under "Uncategorized".
pub fn category_distribution(products: &[Value]) -> Vec<CategoryCount> {
    let mut tally: HashMap<String, usize> = HashMap::new();
    for product in products {
        let category = product
            .get("category")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("Uncategorized");
        *tally.entry(category.to_string()).or_insert(0) += 1;
    }
    sorted_counts(tally)
}

/// Product counts per condition ("New", "Used", ...), largest first.
pub fn condition_distribution(products: &[Value]) -> Vec<CategoryCount> {
    let mut tally: HashMap<String, usize> = HashMap::new();
    for product in products {
        let condition = product
            .get("condition")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(capitalize)
            .unwrap_or_else(|| "Unknown".to_string());
        *tally.entry(condition).or_insert(0) += 1;
    }
    sorted_counts(tally)
}

/// Product counts per price band, in fixed band order. Missing or
/// non-numeric prices count as zero and fall into the lowest band.
pub fn price_distribution(products: &[Value]) -> Vec<CategoryCount> {
    let mut counts = [0usize; PRICE_BANDS.len()];
    for product in products {
        let price = product.get("price").map(numeric_price).unwrap_or(0.0);
        let band = PRICE_BANDS
            .iter()
            .position(|(_, upper)| price < *upper)
            .unwrap_or(PRICE_BANDS.len() - 1);
        counts[band] += 1;
    }
    PRICE_BANDS
        .iter()
        .zip(counts)
        .map(|((name, _), value)| CategoryCount {
            name: (*name).to_string(),
            value,
        })
        .collect()
}

/// Total sellers and how many have been approved.
pub fn seller_verification(sellers: &[Value]) -> SellerMetrics {
    let verified = sellers
        .iter()
        .filter(|s| s.get("approved").and_then(Value::as_bool) == Some(true))
        .count();
    SellerMetrics {
        total: sellers.len(),
        verified,
    }
}

fn sorted_counts(tally: HashMap<String, usize>) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = tally
        .into_iter()
        .map(|(name, value)| CategoryCount { name, value })
        .collect();
    counts.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    counts
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn numeric_price(value: &Value) -> f64 {
    let price = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if price.is_finite() {
        price
    } else {
        0.0
    }
}
