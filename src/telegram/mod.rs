mod formatter;
mod handler;

pub use handler::run_bot;
