//! Append-only per-client conversation history with byte-budgeted
//! eviction.
//!
//! Messages are immutable once written and ordered by timestamp, with
//! the surrogate id as the tie-break for rows written inside the same
//! timestamp tick. The two logical roles are encoded as text prefixes
//! (`"USER: "` / `"AI: "`) so the stored transcript is exactly what the
//! prompt will contain.

use crate::store::{SharedDb, StoreResult};
use tracing::debug;

/// Who produced a message. Rendered as the stored text prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Ai,
}

impl Role {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::User => "USER: ",
            Self::Ai => "AI: ",
        }
    }

    fn render(self, text: &str) -> String {
        format!("{}{}", self.prefix(), text)
    }
}

/// One stored message, prefix included.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i32,
    pub text: String,
}

/// Durable per-client message log.
pub struct ConversationStore {
    db: SharedDb,
}

impl ConversationStore {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Append one turn for the owner. The role prefix is part of the
    /// stored text and counts against the byte budget.
    pub async fn append(&self, owner_id: &str, role: Role, text: &str) -> StoreResult<()> {
        self.db
            .execute(
                "INSERT INTO message_queue (owner_id, message) VALUES ($1, $2)",
                &[&owner_id, &role.render(text)],
            )
            .await?;
        Ok(())
    }

    /// All of the owner's messages, oldest first.
    pub async fn read_all(&self, owner_id: &str) -> StoreResult<Vec<Message>> {
        let rows = self
            .db
            .query(
                "SELECT id, message FROM message_queue
                 WHERE owner_id = $1
                 ORDER BY timestamp_ ASC, id ASC",
                &[&owner_id],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| Message {
                id: row.get(0),
                text: row.get(1),
            })
            .collect())
    }

    /// Delete the owner's oldest messages until the total stored byte
    /// size fits the budget. The total is recomputed from the current
    /// message set on every call; there is no separate counter column.
    pub async fn evict_to_budget(&self, owner_id: &str, byte_budget: usize) -> StoreResult<()> {
        let rows = self
            .db
            .query(
                "SELECT id, octet_length(message) FROM message_queue
                 WHERE owner_id = $1
                 ORDER BY timestamp_ ASC, id ASC",
                &[&owner_id],
            )
            .await?;

        let sizes: Vec<usize> = rows
            .iter()
            .map(|row| row.get::<_, i32>(1) as usize)
            .collect();

        let drop_count = eviction_plan(&sizes, byte_budget);
        if drop_count == 0 {
            return Ok(());
        }

        let total: usize = sizes.iter().sum();
        debug!(
            owner = owner_id,
            total_bytes = total,
            drop_count,
            "history over byte budget, evicting oldest messages"
        );

        for row in rows.iter().take(drop_count) {
            let id: i32 = row.get(0);
            self.db
                .execute("DELETE FROM message_queue WHERE id = $1", &[&id])
                .await?;
        }

        Ok(())
    }
}

/// How many of the oldest messages must go for the remainder to fit the
/// budget. Strict chronological order is the only eviction policy.
fn eviction_plan(sizes: &[usize], byte_budget: usize) -> usize {
    let mut total: usize = sizes.iter().sum();
    let mut dropped = 0;
    while total > byte_budget && dropped < sizes.len() {
        total -= sizes[dropped];
        dropped += 1;
    }
    dropped
}
