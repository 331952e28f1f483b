mod claude;
mod pool;
mod types;

pub use pool::ProviderPool;
pub use types::{LlmResponse, Message, ProviderError, Role, Usage};
