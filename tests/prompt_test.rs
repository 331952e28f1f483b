use bistro_assistant::prompt::{PromptInput, build_system_prompt, build_system_prompt_on};
use chrono::NaiveDate;
use serde_json::json;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

#[test]
fn full_payload_produces_personalized_prompt() {
    let input = PromptInput::from_json(&json!({
        "name": "Minh",
        "city": "Saigon",
        "restaurant": "Com Nha",
        "purchase_history": [
            {"product_name": "Com tam", "quantity": 1, "date": "2026-10-10"},
            {"product_name": "Com tam", "quantity": 1, "date": "2026-10-12"},
            {"product_name": "Tra da", "quantity": 2, "date": "2026-10-17 19:30:00"}
        ],
        "menu": "Com tam suon $6\nCa kho to $7\nTra da $1\nChe ba mau $3",
        "preferences": "Likes spicy food. Allergic to shrimp.",
        "order_patterns": "1. Com tam (40 orders, 52 portions)",
        "events": "Mid-autumn lantern night on Saturday"
    }));

    let prompt = build_system_prompt_on(&input, today());

    assert!(prompt.contains("ordering assistant for Com Nha"));
    assert!(prompt.contains("Today is October 18, 2026."));
    assert!(prompt.contains("Address the customer as Minh"));
    assert!(prompt.contains("Located in Saigon"));
    assert!(prompt.contains("3 past order(s) on record"));
    assert!(prompt.contains("Most popular dish: Com tam (ordered 2 time(s), 2 portion(s) in total)"));
    assert!(prompt.contains("Last order: Tra da x2, ordered yesterday"));
    assert!(prompt.contains("Ca kho to $7"));
    assert!(prompt.contains("Allergic to shrimp"));
    assert!(prompt.contains("1. Com tam (40 orders"));
    assert!(prompt.contains("Mid-autumn lantern night"));
}

#[test]
fn null_history_has_no_popular_dish() {
    let input = PromptInput::from_json(&json!({"name": "Minh", "purchase_history": null}));
    let prompt = build_system_prompt_on(&input, today());
    assert!(!prompt.contains("Most popular dish"));
    assert!(prompt.contains("No previous orders"));
}

#[test]
fn tiny_menu_without_markers_is_unavailable() {
    let input = PromptInput::from_json(&json!({"menu": "closed for now"}));
    let prompt = build_system_prompt_on(&input, today());
    assert!(prompt.contains("menu is currently unavailable"));
    assert!(!prompt.contains("closed for now"));
}

#[test]
fn placeholder_menu_text_is_not_shown_as_menu() {
    for menu in ["Menu coming soon", "Menu unavailable", "Kitchen maintenance"] {
        let input = PromptInput::from_json(&json!({"menu": menu}));
        let prompt = build_system_prompt_on(&input, today());
        assert!(prompt.contains("menu is currently unavailable"), "{menu}");
        assert!(!prompt.contains(menu), "{menu}");
    }
}

#[test]
fn order_dated_today_reads_ordered_today() {
    let input = PromptInput::from_json(&json!({
        "purchase_history": [{"product_name": "Banh mi", "date": "2026-10-18T07:45:00+07:00"}]
    }));
    let prompt = build_system_prompt_on(&input, today());
    assert!(prompt.contains("Last order: Banh mi x1, ordered today"));
}

#[test]
fn offset_order_after_local_midnight_is_still_today_in_utc() {
    let input = PromptInput::from_json(&json!({
        "purchase_history": [{"product_name": "Pho", "date": "2026-10-18T01:00:00+07:00"}]
    }));
    let today_utc = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
    let prompt = build_system_prompt_on(&input, today_utc);
    assert!(prompt.contains("Last order: Pho x1, ordered today"));
}

#[test]
fn malformed_records_are_skipped() {
    let input = PromptInput::from_json(&json!({
        "purchase_history": [
            "not a record",
            {"product_name": "Pho"},
            {"product_name": "Pho", "quantity": "many", "date": "2026-10-01"},
            {"date": "2026-10-01"},
            {"product_name": "Bun bo", "quantity": 1, "date": "2026-10-15"}
        ]
    }));
    let prompt = build_system_prompt_on(&input, today());
    assert!(prompt.contains("1 past order(s) on record"));
    assert!(prompt.contains("Most popular dish: Bun bo"));
    assert!(prompt.contains("ordered 3 days ago (October 15, 2026)"));
}

#[test]
fn garbage_payload_falls_back_to_defaults() {
    for payload in [json!(null), json!([1, 2, 3]), json!("hello"), json!({"name": ["x"]})] {
        let prompt = build_system_prompt(&PromptInput::from_json(&payload));
        assert!(prompt.contains("- Name: Guest"));
        assert!(prompt.contains("No previous orders"));
    }
}
