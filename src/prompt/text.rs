use chrono::NaiveDate;

/// Label used when the customer's name is missing or blank.
pub const GUEST: &str = "Guest";

/// Trim `value`, falling back to `fallback` when it is missing or blank.
pub fn or_default<'a>(value: Option<&'a str>, fallback: &'a str) -> &'a str {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => fallback,
    }
}

/// Trimmed, non-blank text or `None`.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn display_name(name: Option<&str>) -> &str {
    or_default(name, GUEST)
}

/// "October 18, 2026"
pub fn format_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Phrase describing when something was ordered, relative to `today`.
pub fn ordered_when(date: NaiveDate, today: NaiveDate) -> String {
    match (today - date).num_days() {
        0 => "ordered today".to_string(),
        1 => "ordered yesterday".to_string(),
        n if n > 1 => format!("ordered {n} days ago ({})", format_date(date)),
        _ => format!("ordered on {}", format_date(date)),
    }
}
