use rusqlite::{Connection, OptionalExtension, params};
use serde_json::{Value, json};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    Poisoned,
}

/// Restaurant-wide documents kept alongside customer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Menu,
    Events,
    /// Hand-written order trends; overrides the computed ranking when set.
    OrderPatterns,
}

impl DocumentKind {
    fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Menu => "menu",
            DocumentKind::Events => "events",
            DocumentKind::OrderPatterns => "order_patterns",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Customer {
    pub user_id: u64,
    pub name: Option<String>,
    pub city: Option<String>,
    pub preferences: Option<String>,
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        Self::init(conn, path)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, ":memory:")
    }

    fn init(conn: Connection, path: &str) -> Result<Self, StoreError> {
        // Customers and their orders
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS customers (
                user_id INTEGER PRIMARY KEY,
                name TEXT,
                city TEXT,
                preferences TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS purchases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                product_name TEXT NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 1,
                purchased_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS purchases_user ON purchases(user_id, purchased_at);

            CREATE TABLE IF NOT EXISTS documents (
                kind TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;

        // Conversation sessions
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                last_active_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS session_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL REFERENCES sessions(id),
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;

        info!("Database initialized: {path}");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // --- Customers ---

    /// Register the customer, refreshing their display name.
    pub fn upsert_customer(&self, user_id: u64, name: Option<&str>) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO customers (user_id, name) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET name = COALESCE(excluded.name, customers.name)",
            params![user_id as i64, name],
        )?;
        Ok(())
    }

    pub fn set_city(&self, user_id: u64, city: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO customers (user_id, city) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET city = excluded.city",
            params![user_id as i64, city],
        )?;
        Ok(())
    }

    pub fn set_preferences(&self, user_id: u64, preferences: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO customers (user_id, preferences) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET preferences = excluded.preferences",
            params![user_id as i64, preferences],
        )?;
        Ok(())
    }

    pub fn customer(&self, user_id: u64) -> Result<Option<Customer>, StoreError> {
        let conn = self.conn()?;
        let customer = conn
            .query_row(
                "SELECT name, city, preferences FROM customers WHERE user_id = ?1",
                params![user_id as i64],
                |row| {
                    Ok(Customer {
                        user_id,
                        name: row.get(0)?,
                        city: row.get(1)?,
                        preferences: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(customer)
    }

    // --- Purchases ---

    pub fn record_purchase(&self, user_id: u64, product_name: &str, quantity: u32) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO purchases (user_id, product_name, quantity) VALUES (?1, ?2, ?3)",
            params![user_id as i64, product_name, quantity],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Up to the 200 latest purchases from the last `days` days, oldest first,
    /// in the JSON record shape the prompt builder consumes.
    pub fn recent_purchases(&self, user_id: u64, days: i64) -> Result<Vec<Value>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT product_name, quantity, purchased_at FROM (
                SELECT id, product_name, quantity, purchased_at FROM purchases
                WHERE user_id = ?1 AND purchased_at >= datetime('now', ?2)
                ORDER BY purchased_at DESC, id DESC LIMIT 200
             ) ORDER BY purchased_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![user_id as i64, format!("-{days} days")], |row| {
            let product: String = row.get(0)?;
            let quantity: i64 = row.get(1)?;
            let date: String = row.get(2)?;
            Ok(json!({
                "product_name": product,
                "quantity": quantity,
                "date": date,
            }))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Short ranking of the most ordered dishes across all customers. Each
    /// dish is shown with the spelling of its first order.
    pub fn order_patterns_summary(&self, limit: usize) -> Result<String, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "WITH ranked AS (
                SELECT MIN(id) AS first_id, COUNT(*) AS orders, SUM(quantity) AS portions
                FROM purchases GROUP BY lower(product_name)
             )
             SELECT p.product_name, r.orders, r.portions
             FROM ranked r JOIN purchases p ON p.id = r.first_id
             ORDER BY r.orders DESC, r.first_id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;

        let lines: Vec<String> = rows
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .enumerate()
            .map(|(i, (name, orders, quantity))| {
                format!("{}. {name} ({orders} orders, {quantity} portions)", i + 1)
            })
            .collect();
        Ok(lines.join("\n"))
    }

    // --- Documents ---

    pub fn set_document(&self, kind: DocumentKind, content: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (kind, content) VALUES (?1, ?2)
             ON CONFLICT(kind) DO UPDATE SET content = excluded.content, updated_at = datetime('now')",
            params![kind.as_str(), content],
        )?;
        Ok(())
    }

    pub fn document(&self, kind: DocumentKind) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let content = conn
            .query_row(
                "SELECT content FROM documents WHERE kind = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    // --- Conversation history ---

    /// Get or create the active session for a user. Returns session_id.
    pub fn get_or_create_session(&self, user_id: u64) -> Result<String, StoreError> {
        let conn = self.conn()?;
        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM sessions WHERE user_id = ?1 ORDER BY last_active_at DESC LIMIT 1",
                params![user_id as i64],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            conn.execute(
                "UPDATE sessions SET last_active_at = datetime('now') WHERE id = ?1",
                params![&id],
            )?;
            return Ok(id);
        }

        let id = format!("{}-{}", user_id, chrono::Utc::now().timestamp_millis());
        conn.execute(
            "INSERT INTO sessions (id, user_id) VALUES (?1, ?2)",
            params![&id, user_id as i64],
        )?;
        Ok(id)
    }

    /// Load the last N user+assistant message pairs, oldest first.
    pub fn load_history(&self, session_id: &str, max_pairs: usize) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.conn()?;
        let limit = (max_pairs * 2) as i64;
        let mut stmt = conn.prepare(
            "SELECT role, content FROM session_messages WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let mut rows = stmt
            .query_map(params![session_id, limit], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, String)>, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    /// Clear the sessions for a user, forcing a new one on next message.
    pub fn clear_session(&self, user_id: u64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM session_messages WHERE session_id IN (SELECT id FROM sessions WHERE user_id = ?1)",
            params![user_id as i64],
        )?;
        conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id as i64])?;
        Ok(())
    }

    pub fn append_message(&self, session_id: &str, role: &str, content: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO session_messages (session_id, role, content) VALUES (?1, ?2, ?3)",
            params![session_id, role, content],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn customer_profile_round_trip() {
        let db = db();
        assert_eq!(db.customer(1).unwrap(), None);

        db.upsert_customer(1, Some("Linh")).unwrap();
        db.set_city(1, "Hanoi").unwrap();
        db.set_preferences(1, "vegetarian, no peanuts").unwrap();
        // A later upsert without a name keeps the old one
        db.upsert_customer(1, None).unwrap();

        let c = db.customer(1).unwrap().unwrap();
        assert_eq!(c.name.as_deref(), Some("Linh"));
        assert_eq!(c.city.as_deref(), Some("Hanoi"));
        assert_eq!(c.preferences.as_deref(), Some("vegetarian, no peanuts"));
    }

    #[test]
    fn recent_purchases_are_per_user_and_prompt_shaped() {
        let db = db();
        db.record_purchase(1, "Pho", 2).unwrap();
        db.record_purchase(2, "Tea", 1).unwrap();

        db.record_purchase(1, "Tra da", 1).unwrap();

        let history = db.recent_purchases(1, 30).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1]["product_name"], "Tra da");
        let record = crate::prompt::PurchaseRecord::from_value(&history[0]).unwrap();
        assert_eq!(record.product_name, "Pho");
        assert_eq!(record.quantity, 2);
    }

    #[test]
    fn order_patterns_rank_by_order_count() {
        let db = db();
        db.record_purchase(1, "Pho", 1).unwrap();
        db.record_purchase(2, "Banh Mi", 4).unwrap();
        db.record_purchase(3, "pho", 1).unwrap();

        let summary = db.order_patterns_summary(5).unwrap();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("(2 orders, 2 portions)"));
        assert!(lines[1].starts_with("2. Banh Mi"));
    }

    #[test]
    fn order_patterns_keep_first_spelling() {
        let db = db();
        db.record_purchase(1, "pho", 1).unwrap();
        db.record_purchase(2, "Pho", 1).unwrap();
        db.record_purchase(3, "PHO", 1).unwrap();

        assert_eq!(db.order_patterns_summary(5).unwrap(), "1. pho (3 orders, 3 portions)");
    }

    #[test]
    fn empty_store_has_empty_patterns() {
        assert_eq!(db().order_patterns_summary(5).unwrap(), "");
    }

    #[test]
    fn documents_overwrite_by_kind() {
        let db = db();
        assert_eq!(db.document(DocumentKind::Menu).unwrap(), None);
        db.set_document(DocumentKind::Menu, "old").unwrap();
        db.set_document(DocumentKind::Menu, "new").unwrap();
        db.set_document(DocumentKind::Events, "jazz").unwrap();
        db.set_document(DocumentKind::OrderPatterns, "Pho sells out by noon").unwrap();
        assert_eq!(db.document(DocumentKind::Menu).unwrap().as_deref(), Some("new"));
        assert_eq!(db.document(DocumentKind::Events).unwrap().as_deref(), Some("jazz"));
        assert_eq!(
            db.document(DocumentKind::OrderPatterns).unwrap().as_deref(),
            Some("Pho sells out by noon")
        );
    }

    #[test]
    fn session_history_keeps_last_pairs_in_order() {
        let db = db();
        let sid = db.get_or_create_session(7).unwrap();
        assert_eq!(db.get_or_create_session(7).unwrap(), sid);

        for i in 0..3 {
            db.append_message(&sid, "user", &format!("q{i}")).unwrap();
            db.append_message(&sid, "assistant", &format!("a{i}")).unwrap();
        }
        let history = db.load_history(&sid, 2).unwrap();
        let contents: Vec<&str> = history.iter().map(|(_, c)| c.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);

        db.clear_session(7).unwrap();
        assert!(db.load_history(&sid, 2).unwrap().is_empty());
    }

    #[test]
    fn opens_on_disk_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bistro.db");
        let db = Database::open(path.to_str().unwrap()).unwrap();
        db.record_purchase(1, "Pho", 1).unwrap();
        drop(db);

        let reopened = Database::open(path.to_str().unwrap()).unwrap();
        assert_eq!(reopened.recent_purchases(1, 1).unwrap().len(), 1);
    }
}
