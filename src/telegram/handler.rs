use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, ChatAction, ParseMode};
use tracing::{error, info, warn};

use crate::chat::Assistant;
use crate::config::Config;
use crate::db::DocumentKind;

use super::formatter;

struct AppState {
    assistant: Assistant,
    allowed_users: Vec<u64>,
}

/// Bot commands, parsed from the raw message text.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Start,
    Help,
    New,
    Menu,
    /// `None` when no dish was given.
    Order(Option<(u32, &'a str)>),
    Orders,
    City(&'a str),
    Likes(&'a str),
    SetMenu(&'a str),
    Events(&'a str),
    Patterns(&'a str),
    Unknown,
}

fn parse_command(text: &str) -> Command<'_> {
    let (head, args) = text
        .split_once(char::is_whitespace)
        .unwrap_or((text, ""));
    let args = args.trim();
    // "/order@my_bot" in group chats
    let name = head.split('@').next().unwrap_or(head);

    match name {
        "/start" => Command::Start,
        "/help" => Command::Help,
        "/new" => Command::New,
        "/menu" => Command::Menu,
        "/order" => Command::Order(parse_order(args)),
        "/orders" => Command::Orders,
        "/city" => Command::City(args),
        "/likes" => Command::Likes(args),
        "/setmenu" => Command::SetMenu(args),
        "/events" => Command::Events(args),
        "/patterns" => Command::Patterns(args),
        _ => Command::Unknown,
    }
}

impl Command<'_> {
    /// Commands that change text shared by every customer's prompt.
    fn edits_documents(&self) -> bool {
        matches!(self, Command::SetMenu(_) | Command::Events(_) | Command::Patterns(_))
    }
}

/// Only allowlisted users may edit restaurant documents; an empty allowlist
/// admits nobody.
fn may_edit_documents(allowed_users: &[u64], user_id: u64) -> bool {
    allowed_users.contains(&user_id)
}

/// "2 pho bo" -> (2, "pho bo"); "pho bo" -> (1, "pho bo").
fn parse_order(args: &str) -> Option<(u32, &str)> {
    if args.is_empty() {
        return None;
    }
    if let Some((first, rest)) = args.split_once(char::is_whitespace) {
        if let Ok(qty) = first.parse::<u32>() {
            let dish = rest.trim();
            return (qty > 0 && !dish.is_empty()).then_some((qty, dish));
        }
    }
    if args.parse::<u32>().is_ok() {
        return None;
    }
    Some((1, args))
}

pub async fn run_bot(config: Config, assistant: Assistant) {
    let bot = Bot::new(&config.telegram_bot_token);

    let state = Arc::new(AppState {
        assistant,
        allowed_users: config.allowed_users.clone(),
    });

    info!(
        "Bistro Assistant bot started for {}. Allowed users: {:?}",
        config.restaurant_name, config.allowed_users
    );

    let commands = vec![
        BotCommand::new("start", "Welcome & status"),
        BotCommand::new("help", "Show available commands"),
        BotCommand::new("menu", "Show the menu"),
        BotCommand::new("order", "Order a dish: /order 2 pho bo"),
        BotCommand::new("orders", "Your recent orders"),
        BotCommand::new("city", "Set your city"),
        BotCommand::new("likes", "Tell us your tastes and allergies"),
        BotCommand::new("new", "Start new conversation"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        error!("Failed to set bot commands: {e}");
    } else {
        info!("Bot commands menu registered");
    }

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;
}

/// Send text in Telegram-sized chunks, trying Markdown first then plain text.
async fn send_long(bot: &Bot, chat_id: ChatId, text: &str) -> ResponseResult<()> {
    for chunk in formatter::split_message(text, formatter::MAX_MESSAGE_LEN) {
        #[allow(deprecated)]
        let md_result = bot
            .send_message(chat_id, &chunk)
            .parse_mode(ParseMode::Markdown)
            .await;
        if md_result.is_err() {
            bot.send_message(chat_id, &chunk).await?;
        }
    }
    Ok(())
}

async fn handle_message(
    msg: teloxide::types::Message,
    bot: Bot,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let user_id = msg.from.as_ref().map(|u| u.id.0).unwrap_or(0);

    if !state.allowed_users.is_empty() && !state.allowed_users.contains(&user_id) {
        bot.send_message(msg.chat.id, "Unauthorized.").await?;
        return Ok(());
    }

    let text = match msg.text() {
        Some(t) if !t.trim().is_empty() => t.trim().to_string(),
        _ => return Ok(()),
    };

    let first_name = msg.from.as_ref().map(|u| u.first_name.as_str());
    if let Err(e) = state.assistant.db().upsert_customer(user_id, first_name) {
        warn!("Could not register customer {user_id}: {e}");
    }

    if text.starts_with('/') {
        return handle_command(&msg, &bot, &state, &text, user_id).await;
    }

    let _ = bot.send_chat_action(msg.chat.id, ChatAction::Typing).await;
    match state.assistant.reply(user_id, &text).await {
        Ok(answer) if answer.is_empty() => {
            bot.send_message(msg.chat.id, "Sorry, I have no answer for that. Could you rephrase?")
                .await?;
        }
        Ok(answer) => send_long(&bot, msg.chat.id, &answer).await?,
        Err(err) => {
            error!("Chat error for {user_id}: {err}");
            bot.send_message(
                msg.chat.id,
                "Sorry, our assistant is unavailable right now. Please try again in a moment.",
            )
            .await?;
        }
    }
    Ok(())
}

async fn handle_command(
    msg: &teloxide::types::Message,
    bot: &Bot,
    state: &AppState,
    text: &str,
    user_id: u64,
) -> ResponseResult<()> {
    let db = state.assistant.db();
    let chat_id = msg.chat.id;

    let command = parse_command(text);
    if command.edits_documents() && !may_edit_documents(&state.allowed_users, user_id) {
        warn!("User {user_id} tried to edit restaurant documents without being allowlisted");
        bot.send_message(chat_id, "Only restaurant staff can change this.").await?;
        return Ok(());
    }

    let reply = match command {
        Command::Start => format!(
            "Welcome! I can recommend dishes and take your order.\n\
             Just tell me what you feel like eating.\n\n\
             API keys: {} (round-robin)\n\
             /help for commands",
            state.assistant.key_count()
        ),
        Command::Help => "/menu — Show the menu\n\
             /order [qty] <dish> — Add a dish to your orders\n\
             /orders — Your recent orders\n\
             /city <name> — Set your city\n\
             /likes <text> — Tastes, diet, allergies\n\
             /new — Start new conversation\n\
             /setmenu, /events, /patterns <text> — Update restaurant info (staff)"
            .to_string(),
        Command::New => match db.clear_session(user_id) {
            Ok(()) => "Session cleared. Starting fresh conversation.".to_string(),
            Err(e) => store_failure("clear session", e),
        },
        Command::Menu => match db.document(DocumentKind::Menu) {
            Ok(Some(menu)) if !menu.trim().is_empty() => menu,
            Ok(_) => "The menu is not available yet.".to_string(),
            Err(e) => store_failure("load menu", e),
        },
        Command::Order(None) => "Usage: /order [qty] <dish>, e.g. /order 2 pho bo".to_string(),
        Command::Order(Some((qty, dish))) => match db.record_purchase(user_id, dish, qty) {
            Ok(id) => {
                info!("Order #{id}: user {user_id} x{qty} {dish}");
                format!("Added {dish} x{qty} to your orders.")
            }
            Err(e) => store_failure("record order", e),
        },
        Command::Orders => match db.recent_purchases(user_id, 30) {
            Ok(purchases) => formatter::format_purchases(&purchases),
            Err(e) => store_failure("load orders", e),
        },
        Command::City("") => "Usage: /city <name>".to_string(),
        Command::City(city) => match db.set_city(user_id, city) {
            Ok(()) => format!("Got it, you're in {city}."),
            Err(e) => store_failure("save city", e),
        },
        Command::Likes("") => "Usage: /likes <what you like, diet, allergies>".to_string(),
        Command::Likes(prefs) => match db.set_preferences(user_id, prefs) {
            Ok(()) => "Thanks, I'll keep that in mind.".to_string(),
            Err(e) => store_failure("save preferences", e),
        },
        Command::SetMenu("") => "Usage: /setmenu <menu text>".to_string(),
        Command::SetMenu(menu) => match db.set_document(DocumentKind::Menu, menu) {
            Ok(()) => "Menu updated.".to_string(),
            Err(e) => store_failure("save menu", e),
        },
        Command::Events(events) => match db.set_document(DocumentKind::Events, events) {
            Ok(()) if events.is_empty() => "Events cleared.".to_string(),
            Ok(()) => "Events updated.".to_string(),
            Err(e) => store_failure("save events", e),
        },
        Command::Patterns(patterns) => match db.set_document(DocumentKind::OrderPatterns, patterns) {
            Ok(()) if patterns.is_empty() => "Order patterns reset to the computed ranking.".to_string(),
            Ok(()) => "Order patterns updated.".to_string(),
            Err(e) => store_failure("save order patterns", e),
        },
        Command::Unknown => "Unknown command. /help".to_string(),
    };

    for chunk in formatter::split_message(&reply, formatter::MAX_MESSAGE_LEN) {
        bot.send_message(chat_id, chunk).await?;
    }
    Ok(())
}

fn store_failure(action: &str, e: crate::db::StoreError) -> String {
    error!("Failed to {action}: {e}");
    format!("Could not {action}, please try again.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse_command("/start"), Command::Start);
        assert_eq!(parse_command("/menu@bistro_bot"), Command::Menu);
        assert_eq!(parse_command("/orders"), Command::Orders);
        assert_eq!(parse_command("/dance"), Command::Unknown);
    }

    #[test]
    fn parses_order_quantities() {
        assert_eq!(parse_command("/order 2 pho bo"), Command::Order(Some((2, "pho bo"))));
        assert_eq!(parse_command("/order banh mi"), Command::Order(Some((1, "banh mi"))));
        assert_eq!(parse_command("/order"), Command::Order(None));
        assert_eq!(parse_command("/order 3"), Command::Order(None));
        assert_eq!(parse_command("/order 0 tea"), Command::Order(None));
    }

    #[test]
    fn keeps_multiline_arguments() {
        assert_eq!(
            parse_command("/setmenu\nPho bo $9\nBun cha $8"),
            Command::SetMenu("Pho bo $9\nBun cha $8")
        );
        assert_eq!(parse_command("/city  Da Nang "), Command::City("Da Nang"));
        assert_eq!(parse_command("/likes"), Command::Likes(""));
        assert_eq!(
            parse_command("/patterns Pho sells out by noon"),
            Command::Patterns("Pho sells out by noon")
        );
    }

    #[test]
    fn document_edits_need_an_allowlist() {
        assert!(parse_command("/setmenu Pho $9").edits_documents());
        assert!(parse_command("/events").edits_documents());
        assert!(parse_command("/patterns x").edits_documents());
        assert!(!parse_command("/order pho").edits_documents());

        assert!(!may_edit_documents(&[], 42));
        assert!(!may_edit_documents(&[7], 42));
        assert!(may_edit_documents(&[7, 42], 42));
    }
}
