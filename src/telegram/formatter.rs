//! Message formatting for Telegram output.

use serde_json::Value;

use crate::prompt::{PurchaseRecord, format_date};

/// Telegram's hard limit per message.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Find the largest char-boundary index <= `pos` in `s`.
fn floor_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut i = pos;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let safe_end = floor_char_boundary(remaining, max_len);
        let search_zone = &remaining[..safe_end];

        let split_at = search_zone
            .rfind('\n')
            .unwrap_or_else(|| search_zone.rfind(' ').unwrap_or(safe_end));

        // Avoid zero-length splits
        let split_at = if split_at == 0 { safe_end } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

/// One line per stored purchase; unreadable rows are left out.
pub fn format_purchases(purchases: &[Value]) -> String {
    let lines: Vec<String> = purchases
        .iter()
        .filter_map(|v| PurchaseRecord::from_value(v).ok())
        .map(|r| format!("- {} x{} ({})", r.product_name, r.quantity, format_date(r.date)))
        .collect();
    if lines.is_empty() {
        "No orders yet.".to_string()
    } else {
        format!("Your recent orders:\n{}", lines.join("\n"))
    }
}
