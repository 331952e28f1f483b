use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

use super::claude::ClaudeProvider;
use super::types::*;

struct KeyPool {
    keys: Vec<String>,
    index: AtomicUsize,
}

impl KeyPool {
    fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            index: AtomicUsize::new(0),
        }
    }

    fn next_key(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        Some(&self.keys[idx])
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

fn key_hint(key: &str) -> &str {
    let mut end = key.len().min(10);
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    &key[..end]
}

/// Claude-only provider pool with round-robin key rotation
pub struct ProviderPool {
    provider: ClaudeProvider,
    keys: KeyPool,
}

impl ProviderPool {
    pub fn new(claude_keys: Vec<String>, model: &str) -> Self {
        info!("Provider pool: Claude ({model}) with {} keys", claude_keys.len());
        Self {
            provider: ClaudeProvider::new(model),
            keys: KeyPool::new(claude_keys),
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Send a chat request, trying all keys with rotation
    pub async fn chat(&self, messages: &[Message]) -> Result<LlmResponse, ProviderError> {
        let num_keys = self.keys.len();
        if num_keys == 0 {
            return Err(ProviderError::NoKeys);
        }

        for _attempt in 0..num_keys {
            let Some(key) = self.keys.next_key() else {
                break;
            };

            info!("Trying Claude (key: {}...)", key_hint(key));
            match self.provider.chat(messages, key).await {
                Ok(response) => {
                    info!(
                        "Claude succeeded ({} + {} tokens, cache: {}w/{}r)",
                        response.usage.prompt_tokens,
                        response.usage.completion_tokens,
                        response.usage.cache_creation_tokens,
                        response.usage.cache_read_tokens,
                    );
                    return Ok(response);
                }
                Err(ProviderError::RateLimited) => {
                    warn!("Claude RATE LIMITED (key: {}...), trying next key", key_hint(key));
                    continue;
                }
                Err(e) => {
                    warn!("Claude FAILED (key: {}...): {e}", key_hint(key));
                    return Err(e);
                }
            }
        }

        Err(ProviderError::RequestError("All Claude keys exhausted".into()))
    }
}
