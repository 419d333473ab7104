//! Probabilistic reclamation of stale history.
//!
//! Invoked inline once per admitted request instead of from a scheduled
//! task: each invocation fires with probability `1/denominator`, and a
//! firing deletes the owner's messages older than the age threshold,
//! scoped through the `last_activity` anchor. Across a large request
//! population this bounds total storage in expectation without any
//! cross-request coordination. It is independent of byte-budget
//! eviction, which triggers on size rather than age.

use rand::Rng;
use tracing::debug;

use crate::store::{SharedDb, StoreResult};

pub struct Reaper {
    db: SharedDb,
}

impl Reaper {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// With probability `1/denominator`, delete the owner's messages
    /// older than `age_threshold_secs`. A denominator of 1 fires every
    /// time, which is the deterministic boundary case the tests use.
    pub async fn maybe_reclaim(
        &self,
        owner_id: &str,
        denominator: u32,
        age_threshold_secs: i64,
    ) -> StoreResult<()> {
        let roll = rand::rng().random_range(0..denominator.max(1));
        if roll != 0 {
            return Ok(());
        }

        debug!(owner = owner_id, "running random history reclamation");

        let age_secs = age_threshold_secs as f64;
        let deleted = self
            .db
            .execute(
                "DELETE FROM message_queue
                 WHERE id IN (
                     SELECT id
                     FROM message_queue
                     WHERE owner_id = (
                         SELECT owner_id
                         FROM last_activity
                         WHERE owner_id = $1
                         LIMIT 1
                     )
                     AND (EXTRACT(EPOCH FROM (current_timestamp - timestamp_)))::double precision >= $2
                 )",
                &[&owner_id, &age_secs],
            )
            .await?;

        if deleted > 0 {
            debug!(owner = owner_id, deleted, "reclaimed stale messages");
        }

        Ok(())
    }
}
