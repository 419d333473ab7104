//! Per-client rate limiting over two independent keys.
//!
//! Every client is identified by a session id and an address fingerprint;
//! both keys share one counter keyspace in the `ratelimit` table. A
//! request is blocked when *either* key is at the limit inside the delay
//! window. Counter expiry is lazy: a counter is only reset when the key
//! is next touched, and the block test runs before the reset so that a
//! client exactly at the threshold is still blocked on the request that
//! would otherwise clear it.

use crate::store::{SharedDb, StoreResult};
use tracing::debug;

/// Which key(s) accumulate usage after admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitMode {
    BySession,
    ByAddress,
    Both,
}

impl RateLimitMode {
    fn counts_session(self) -> bool {
        matches!(self, Self::BySession | Self::Both)
    }

    fn counts_address(self) -> bool {
        matches!(self, Self::ByAddress | Self::Both)
    }
}

/// Outcome of the block test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Blocked, with the whole seconds the client should wait (>= 1).
    Blocked { wait_secs: i64 },
}

/// Durable per-key counter with a reset-after-idle policy.
pub struct RateLimiter {
    db: SharedDb,
}

impl RateLimiter {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Test both keys against the limit, then lazily reset any idle
    /// counter. Reads only; usage is recorded separately after admission.
    pub async fn check(
        &self,
        session_id: &str,
        addr_fingerprint: &str,
        limit_count: i32,
        limit_delay_ms: i64,
    ) -> StoreResult<Admission> {
        let delay_ms = limit_delay_ms as f64;

        let rows = self
            .db
            .query(
                "SELECT (EXTRACT(EPOCH FROM (current_timestamp - timestamp_)) * 1000.0)::double precision
                     AS elapsed_ms
                 FROM ratelimit
                 WHERE (key = $1 OR key = $2)
                 AND count >= $3
                 AND (EXTRACT(EPOCH FROM (current_timestamp - timestamp_)) * 1000.0)::double precision < $4
                 ORDER BY elapsed_ms ASC
                 LIMIT 1",
                &[&session_id, &addr_fingerprint, &limit_count, &delay_ms],
            )
            .await?;

        if let Some(row) = rows.first() {
            let elapsed_ms: f64 = row.get(0);
            let wait_secs = wait_seconds(limit_delay_ms, elapsed_ms);
            debug!(session = session_id, wait_secs, "request blocked by rate limit");
            return Ok(Admission::Blocked { wait_secs });
        }

        // Lazy expiry, per key independently. A counter at exactly 1 is
        // left alone: it already reflects a single request.
        for key in [session_id, addr_fingerprint] {
            let reset = self
                .db
                .execute(
                    "UPDATE ratelimit SET count = 0
                     WHERE key = $1
                     AND count > 1
                     AND (EXTRACT(EPOCH FROM (current_timestamp - timestamp_)) * 1000.0)::double precision >= $2",
                    &[&key, &delay_ms],
                )
                .await?;
            if reset > 0 {
                debug!(key, "idle rate-limit counter reset");
            }
        }

        Ok(Admission::Admitted)
    }

    /// Upsert the counter for each key the configured mode counts.
    /// Runs unconditionally once the block test passes.
    pub async fn record_usage(
        &self,
        session_id: &str,
        addr_fingerprint: &str,
        mode: RateLimitMode,
    ) -> StoreResult<()> {
        if mode.counts_session() {
            self.bump(session_id).await?;
        }
        if mode.counts_address() {
            self.bump(addr_fingerprint).await?;
        }
        Ok(())
    }

    async fn bump(&self, key: &str) -> StoreResult<()> {
        self.db
            .execute(
                "INSERT INTO ratelimit (key) VALUES ($1)
                 ON CONFLICT (key)
                 DO UPDATE SET count = ratelimit.count + 1, timestamp_ = DEFAULT",
                &[&key],
            )
            .await?;
        Ok(())
    }
}

/// Whole seconds remaining in the delay window, rounded up and clamped
/// to at least 1 so the refusal is never phrased as "0 seconds".
pub fn wait_seconds(limit_delay_ms: i64, elapsed_ms: f64) -> i64 {
    let remaining_ms = limit_delay_ms as f64 - elapsed_ms;
    (remaining_ms / 1000.0).ceil().max(1.0) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_rounds_up_to_whole_seconds() {
        assert_eq!(wait_seconds(30_000, 100.0), 30);
        assert_eq!(wait_seconds(30_000, 29_000.5), 1);
        assert_eq!(wait_seconds(120_000, 1.0), 120);
    }

    #[test]
    fn wait_is_clamped_to_one_second() {
        assert_eq!(wait_seconds(30_000, 29_999.9), 1);
        // Window already elapsed between the block test and the math.
        assert_eq!(wait_seconds(30_000, 30_500.0), 1);
    }

    #[test]
    fn mode_selects_keys() {
        assert!(RateLimitMode::Both.counts_session());
        assert!(RateLimitMode::Both.counts_address());
        assert!(!RateLimitMode::BySession.counts_address());
        assert!(!RateLimitMode::ByAddress.counts_session());
    }
}
