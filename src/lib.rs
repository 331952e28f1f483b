pub mod chat;
pub mod config;
pub mod db;
pub mod prompt;
pub mod provider;
pub mod telegram;
