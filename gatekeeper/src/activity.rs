//! Last-activity tracking, one row per session id.
//!
//! Upserted on every admitted request. Only read by the reaper, which
//! uses it to scope reclamation to the most recently active session.

use crate::store::{SharedDb, StoreResult};

pub struct ActivityLog {
    db: SharedDb,
}

impl ActivityLog {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Record that the owner was just active, refreshing the timestamp
    /// if a row already exists.
    pub async fn touch(&self, owner_id: &str) -> StoreResult<()> {
        self.db
            .execute(
                "INSERT INTO last_activity (owner_id) VALUES ($1)
                 ON CONFLICT (owner_id)
                 DO UPDATE SET timestamp_ = DEFAULT",
                &[&owner_id],
            )
            .await?;
        Ok(())
    }
}
