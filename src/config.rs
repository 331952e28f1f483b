use std::env;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub allowed_users: Vec<u64>,
    pub claude_keys: Vec<String>,
    pub claude_model: String,
    pub restaurant_name: String,
    pub database_path: String,
    pub history_pairs: usize,
    /// How far back purchases are fed into the prompt.
    pub history_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var("BISTRO_ENV_FILE") {
            Ok(path) => {
                dotenvy::from_path_override(path).ok();
            }
            Err(_) => {
                dotenvy::dotenv().ok();
            }
        }

        Ok(Self {
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty())
                .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?,
            allowed_users: env::var("TELEGRAM_ALLOWED_USERS")
                .unwrap_or_default()
                .split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.trim().parse().ok())
                .collect(),
            claude_keys: parse_list("CLAUDE_API_KEYS"),
            claude_model: env::var("CLAUDE_MODEL")
                .unwrap_or_else(|_| "claude-haiku-4-5-20251001".into()),
            restaurant_name: env::var("RESTAURANT_NAME")
                .unwrap_or_else(|_| "our restaurant".into()),
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "bistro-assistant.db".into()),
            history_pairs: parse_number("HISTORY_PAIRS", 6)?,
            history_days: parse_number("HISTORY_DAYS", 90)?,
        })
    }
}

fn parse_list(env_var: &str) -> Vec<String> {
    split_list(&env::var(env_var).unwrap_or_default())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { name, value: v }),
        _ => Ok(default),
    }
}
