use tracing::{debug, info, warn};

use crate::db::{Database, DocumentKind, StoreError};
use crate::prompt::{self, PromptInput};
use crate::provider::{Message, ProviderError, ProviderPool, Role};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("LLM error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub restaurant_name: String,
    pub history_pairs: usize,
    pub history_days: i64,
    pub top_dishes: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            restaurant_name: "our restaurant".into(),
            history_pairs: 6,
            history_days: 90,
            top_dishes: 5,
        }
    }
}

/// One ordering assistant: store, LLM pool and the knobs that shape a turn.
pub struct Assistant {
    pool: ProviderPool,
    db: Database,
    settings: ChatSettings,
}

impl Assistant {
    pub fn new(pool: ProviderPool, db: Database, settings: ChatSettings) -> Self {
        Self { pool, db, settings }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn key_count(&self) -> usize {
        self.pool.key_count()
    }

    /// Collect what the store knows about this user. Store failures only
    /// blank out the affected field.
    pub fn prompt_input(&self, user_id: u64) -> PromptInput {
        let customer = self.db.customer(user_id).unwrap_or_else(|e| {
            warn!("Customer lookup failed for {user_id}: {e}");
            None
        });
        let purchase_history = self
            .db
            .recent_purchases(user_id, self.settings.history_days)
            .unwrap_or_else(|e| {
                warn!("Purchase history unavailable for {user_id}: {e}");
                Vec::new()
            });
        let order_patterns = self
            .document(DocumentKind::OrderPatterns)
            .filter(|p| !p.trim().is_empty())
            .or_else(|| {
                self.db
                    .order_patterns_summary(self.settings.top_dishes)
                    .map_err(|e| warn!("Order patterns unavailable: {e}"))
                    .ok()
            });

        let (name, city, preferences) = match customer {
            Some(c) => (c.name, c.city, c.preferences),
            None => (None, None, None),
        };

        PromptInput {
            name,
            city,
            purchase_history,
            menu: self.document(DocumentKind::Menu),
            preferences,
            order_patterns,
            events: self.document(DocumentKind::Events),
            restaurant: Some(self.settings.restaurant_name.clone()),
        }
    }

    fn document(&self, kind: DocumentKind) -> Option<String> {
        self.db.document(kind).unwrap_or_else(|e| {
            warn!("Document {kind:?} unavailable: {e}");
            None
        })
    }

    pub fn system_prompt(&self, user_id: u64) -> String {
        prompt::build_system_prompt(&self.prompt_input(user_id))
    }

    /// Answer one customer message. The exchange is saved only when the LLM
    /// call succeeds.
    pub async fn reply(&self, user_id: u64, text: &str) -> Result<String, ChatError> {
        let system_prompt = self.system_prompt(user_id);
        debug!("System prompt for {user_id}: {} chars", system_prompt.len());

        let session_id = self.db.get_or_create_session(user_id)?;
        let history = self.db.load_history(&session_id, self.settings.history_pairs)?;

        let mut messages = vec![Message::new(Role::System, system_prompt)];
        messages.extend(history.into_iter().filter_map(|(role, content)| {
            match Role::parse(&role) {
                Some(r @ (Role::User | Role::Assistant)) => Some(Message::new(r, content)),
                _ => None,
            }
        }));
        messages.push(Message::new(Role::User, text));

        let start = std::time::Instant::now();
        let response = self.pool.chat(&messages).await?;
        info!(
            "Reply for {user_id} in {:.1}s ({} history messages)",
            start.elapsed().as_secs_f64(),
            messages.len() - 2
        );

        let answer = response.content.trim().to_string();
        self.db.append_message(&session_id, Role::User.as_str(), text)?;
        self.db.append_message(&session_id, Role::Assistant.as_str(), &answer)?;
        Ok(answer)
    }
}
