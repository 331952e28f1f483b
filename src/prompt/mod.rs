//! System prompt assembly for the ordering assistant.
//!
//! Everything handed in here is treated as untrusted: a missing or malformed
//! field turns into a fallback (`"Guest"`, an omitted section, a menu marked
//! unavailable) and [`build_system_prompt`] always returns a prompt.

mod history;
mod menu;
mod text;

pub use history::{PopularDish, PurchaseRecord, RecordError, most_popular, most_recent, parse_date, parse_history};
pub use menu::{MIN_MENU_CHARS, menu_available};
pub use text::{GUEST, format_date};

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, warn};

const DEFAULT_RESTAURANT: &str = "our restaurant";

/// Everything the prompt is built from. All fields may be absent.
#[derive(Debug, Clone, Default)]
pub struct PromptInput {
    pub name: Option<String>,
    pub city: Option<String>,
    /// Raw purchase records, validated one by one.
    pub purchase_history: Vec<Value>,
    pub menu: Option<String>,
    pub preferences: Option<String>,
    pub order_patterns: Option<String>,
    pub events: Option<String>,
    pub restaurant: Option<String>,
}

impl PromptInput {
    /// Pull the fields out of an arbitrary JSON payload. Fields of the wrong
    /// type are dropped; a non-array history becomes an empty one.
    pub fn from_json(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        let purchase_history = match value.get("purchase_history") {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => {
                debug!("purchase_history is not a list ({other}), ignoring");
                Vec::new()
            }
            None => Vec::new(),
        };

        Self {
            name: text("name"),
            city: text("city"),
            purchase_history,
            menu: text("menu"),
            preferences: text("preferences"),
            order_patterns: text("order_patterns"),
            events: text("events"),
            restaurant: text("restaurant"),
        }
    }
}

/// Build the system prompt as of the current UTC date.
pub fn build_system_prompt(input: &PromptInput) -> String {
    build_system_prompt_on(input, Utc::now().date_naive())
}

/// Build the system prompt, treating `today` as the current date.
pub fn build_system_prompt_on(input: &PromptInput, today: NaiveDate) -> String {
    let name = text::display_name(input.name.as_deref());
    let restaurant = text::or_default(input.restaurant.as_deref(), DEFAULT_RESTAURANT);

    let mut prompt = format!(
        "You are the friendly ordering assistant for {restaurant}.\n\
         Help the customer choose dishes, answer questions about the menu and take their order.\n\
         Keep answers short and warm (chat format). Reply in the customer's language.\n\
         Today is {}.\n",
        text::format_date(today)
    );

    prompt.push_str("\n## CUSTOMER\n");
    prompt.push_str(&format!("- Name: {name}\n"));
    if name == GUEST {
        debug!("No customer name, addressing them as {GUEST}");
        prompt.push_str("- The customer has not shared their name; address them politely without one.\n");
    } else {
        prompt.push_str(&format!("- Address the customer as {name}.\n"));
    }
    if let Some(city) = text::non_blank(input.city.as_deref()) {
        prompt.push_str(&format!("- Located in {city}. Mention local delivery only for {city}.\n"));
    }

    prompt.push_str(&history_section(&input.purchase_history, today));
    prompt.push_str(&menu_section(input.menu.as_deref()));

    if let Some(prefs) = text::non_blank(input.preferences.as_deref()) {
        prompt.push_str(&format!("\n## CUSTOMER PREFERENCES\n{prefs}\n"));
    }
    if let Some(patterns) = text::non_blank(input.order_patterns.as_deref()) {
        prompt.push_str(&format!("\n## WHAT OTHER GUESTS ORDER\n{patterns}\n"));
    }
    if let Some(events) = text::non_blank(input.events.as_deref()) {
        prompt.push_str(&format!(
            "\n## UPCOMING EVENTS\n{events}\nMention an event only when it fits the conversation.\n"
        ));
    }

    prompt.push_str(
        "\n## RULES\n\
         1. Only recommend dishes that appear on the menu.\n\
         2. Before confirming an order, repeat the dishes and quantities back to the customer.\n\
         3. Respect stated allergies and dietary preferences; when unsure, ask.\n\
         4. Never make up prices, opening hours or promotions.\n",
    );

    prompt
}

fn history_section(raw: &[Value], today: NaiveDate) -> String {
    let records = parse_history(raw);
    if records.is_empty() {
        return "\n## ORDER HISTORY\nNo previous orders. Treat this as a first visit and suggest popular choices.\n"
            .to_string();
    }

    let mut section = format!("\n## ORDER HISTORY\n- {} past order(s) on record.\n", records.len());
    if let Some(top) = most_popular(&records) {
        section.push_str(&format!(
            "- Most popular dish: {} (ordered {} time(s), {} portion(s) in total).\n",
            top.name, top.orders, top.quantity
        ));
    }
    if let Some(last) = most_recent(&records) {
        section.push_str(&format!(
            "- Last order: {} x{}, {}.\n",
            last.product_name,
            last.quantity,
            text::ordered_when(last.date, today)
        ));
        if last.date == today {
            section.push_str("- They already ordered today; ask whether they want the same again or something new.\n");
        }
    }
    section
}

fn menu_section(menu: Option<&str>) -> String {
    if !menu_available(menu) {
        warn!("Menu unavailable, prompting without it");
        return "\n## MENU\nThe menu is currently unavailable. Do not invent dishes or prices; \
                tell the customer the menu will be back shortly.\n"
            .to_string();
    }
    format!("\n## MENU\n{}\n", menu.map(str::trim).unwrap_or_default())
}
