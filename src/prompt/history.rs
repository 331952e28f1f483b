use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::debug;

/// One validated line of a customer's purchase history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRecord {
    pub product_name: String,
    pub quantity: u32,
    pub date: NaiveDate,
}

/// Why a raw history entry was rejected. Never leaves this module's callers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing product name")]
    MissingProduct,
    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("missing date")]
    MissingDate,
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

impl PurchaseRecord {
    /// Validate one untrusted JSON history entry.
    pub fn from_value(value: &Value) -> Result<Self, RecordError> {
        let obj = value.as_object().ok_or(RecordError::NotAnObject)?;

        let product_name = ["product_name", "name", "product"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RecordError::MissingProduct)?
            .to_string();

        let quantity = match obj.get("quantity") {
            None | Some(Value::Null) => 1,
            Some(q) => parse_quantity(q)?,
        };

        let raw_date = ["date", "purchased_at"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .ok_or(RecordError::MissingDate)?;
        let date = parse_date(raw_date).ok_or_else(|| RecordError::InvalidDate(raw_date.to_string()))?;

        Ok(Self {
            product_name,
            quantity,
            date,
        })
    }
}

fn parse_quantity(value: &Value) -> Result<u32, RecordError> {
    let n = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    n.filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| RecordError::InvalidQuantity(value.to_string()))
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and `YYYY-MM-DD`.
/// Offset timestamps land on their UTC calendar day; naive ones are taken as UTC.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Parse every entry, dropping the malformed ones.
pub fn parse_history(values: &[Value]) -> Vec<PurchaseRecord> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| match PurchaseRecord::from_value(v) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping purchase record #{i}: {e}");
                None
            }
        })
        .collect()
}

/// The dish ordered most often, with how many orders and units it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopularDish {
    pub name: String,
    pub orders: usize,
    pub quantity: u32,
}

/// Most frequently ordered item. Names compare case-insensitively, the first
/// spelling seen is kept, and ties go to the item seen first.
pub fn most_popular(records: &[PurchaseRecord]) -> Option<PopularDish> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut tally: Vec<PopularDish> = Vec::new();

    for r in records {
        let key = r.product_name.to_lowercase();
        let slot = *index.entry(key).or_insert_with(|| {
            tally.push(PopularDish {
                name: r.product_name.clone(),
                orders: 0,
                quantity: 0,
            });
            tally.len() - 1
        });
        let entry = &mut tally[slot];
        entry.orders += 1;
        entry.quantity = entry.quantity.saturating_add(r.quantity);
    }

    let mut best: Option<PopularDish> = None;
    for dish in tally {
        if best.as_ref().is_none_or(|b| dish.orders > b.orders) {
            best = Some(dish);
        }
    }
    best
}

/// Latest record by date; the later entry wins on equal dates.
pub fn most_recent(records: &[PurchaseRecord]) -> Option<&PurchaseRecord> {
    records.iter().max_by_key(|r| r.date)
}
