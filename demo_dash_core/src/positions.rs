use crate::models::Position;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Open simulated longs keyed by token. A key being present means the
/// token is currently held.
#[derive(Debug, Default)]
pub struct PositionTracker {
    open: Mutex<HashMap<String, Position>>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, token: &str) -> Option<Position> {
        self.open.lock().await.get(token).cloned()
    }

    pub async fn is_open(&self, token: &str) -> bool {
        self.open.lock().await.contains_key(token)
    }

    /// Open a position unless one already exists. Returns the new position.
    pub async fn open(&self, token: &str, entry_price: f64, usd_amount: f64) -> Option<Position> {
        let mut open = self.open.lock().await;
        if open.contains_key(token) {
            return None;
        }
        let position = Position {
            token: token.to_string(),
            entry_price,
            usd_amount,
            opened_at: Utc::now(),
        };
        open.insert(token.to_string(), position.clone());
        Some(position)
    }

    pub async fn close(&self, token: &str) -> Option<Position> {
        self.open.lock().await.remove(token)
    }

    pub async fn snapshot(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.open.lock().await.values().cloned().collect();
        positions.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.token.cmp(&b.token)));
        positions
    }

    pub async fn len(&self) -> usize {
        self.open.lock().await.len()
    }
}
