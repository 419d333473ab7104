//! The admission pipeline — explicit gate states and the admitted-path
//! sequence.
//!
//! Every question passes the gates in a fixed order (disabled → empty →
//! too long → rate limited), and each gate is terminal: it produces a
//! single response string and nothing else runs. Only an admitted
//! request touches history, records usage, and reaches the responder.
//!
//! Admitted sequence, never reordered: reaper → append user turn →
//! last-activity upsert → record usage → read history → evict to budget
//! → prompt assembly → responder → append reply turn.

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gatekeeper::{
    ActivityLog, Admission, ConversationStore, RateLimitMode, RateLimiter, Reaper, Role, SharedDb,
};

use crate::knowledge::TextProvider;
use crate::responder::Responder;
use crate::settings::Settings;

/// Outcome of gating one request. All variants except `Admitted` are
/// terminal and map to a canned refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Chatbot switched off in the settings file.
    Disabled,
    /// Trimmed input was empty.
    EmptyInput,
    /// Input exceeds the configured maximum length.
    TooLong { max: usize },
    /// One of the client's keys is at the limit inside the window.
    RateLimited { wait_secs: i64 },
    /// All gates passed; the request proceeds.
    Admitted,
}

impl Verdict {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Admitted)
    }

    /// The user-facing refusal for a terminal verdict.
    pub fn refusal(&self) -> Option<String> {
        match self {
            Self::Disabled => Some(
                "Sorry, but I cannot answer your question at the moment. Please try again later."
                    .to_string(),
            ),
            Self::EmptyInput => {
                Some("Please type a question and I will do my best to answer it.".to_string())
            }
            Self::TooLong { max } => Some(format!(
                "Your question is too long (>{max} characters). Please condense it and try again."
            )),
            Self::RateLimited { wait_secs } => Some(format!(
                "Sorry, but you have sent too many messages. \
                 Please wait {wait_secs} seconds and try again."
            )),
            Self::Admitted => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Disabled"),
            Self::EmptyInput => write!(f, "EmptyInput"),
            Self::TooLong { .. } => write!(f, "TooLong"),
            Self::RateLimited { .. } => write!(f, "RateLimited"),
            Self::Admitted => write!(f, "Admitted"),
        }
    }
}

/// The gates that need no storage access, in their fixed order.
fn screen(question: &str, settings: &Settings) -> Verdict {
    if !settings.chatbot_enabled {
        return Verdict::Disabled;
    }
    if question.trim().is_empty() {
        return Verdict::EmptyInput;
    }
    if question.len() > settings.max_question_length {
        return Verdict::TooLong {
            max: settings.max_question_length,
        };
    }
    Verdict::Admitted
}

/// Tunables for the admitted path.
#[derive(Debug, Clone)]
pub struct ChatPolicy {
    /// Maximum retained history per client, in bytes (prefix included).
    pub byte_budget: usize,
    /// Reaper fires with probability 1/denominator per admitted request.
    pub reaper_denominator: u32,
    /// Messages older than this many seconds are reclaimable.
    pub reaper_age_secs: i64,
    /// Which key(s) accumulate rate-limit usage.
    pub rate_limit_mode: RateLimitMode,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            // ~10 KB per client keeps the prompt well inside context.
            byte_budget: 1024 * 10,
            // Every ~10,000 admitted requests, within an order of
            // magnitude of 10 MB of data, reclaim one client's history
            // older than two hours.
            reaper_denominator: 10_000,
            reaper_age_secs: 7200,
            rate_limit_mode: RateLimitMode::Both,
        }
    }
}

/// Sequences the gates and drives the stores and the responder.
pub struct Chatbot {
    limiter: RateLimiter,
    store: ConversationStore,
    activity: ActivityLog,
    reaper: Reaper,
    responder: Box<dyn Responder>,
    provider: Box<dyn TextProvider>,
    policy: ChatPolicy,
}

impl Chatbot {
    pub fn new(
        db: SharedDb,
        responder: Box<dyn Responder>,
        provider: Box<dyn TextProvider>,
        policy: ChatPolicy,
    ) -> Self {
        Self {
            limiter: RateLimiter::new(db.clone()),
            store: ConversationStore::new(db.clone()),
            activity: ActivityLog::new(db.clone()),
            reaper: Reaper::new(db),
            responder,
            provider,
            policy,
        }
    }

    /// Answer one question. Terminal gate states come back as `Ok` with
    /// the refusal text; storage and responder failures propagate.
    pub async fn answer(
        &self,
        session_id: &str,
        addr_fingerprint: &str,
        question: &str,
        settings: &Settings,
    ) -> Result<String> {
        let verdict = screen(question, settings);
        if let Some(refusal) = verdict.refusal() {
            debug!(session = session_id, %verdict, "request refused before admission");
            return Ok(refusal);
        }

        let admission = self
            .limiter
            .check(
                session_id,
                addr_fingerprint,
                settings.rate_limit_count,
                settings.rate_limit_delay_ms,
            )
            .await?;

        if let Admission::Blocked { wait_secs } = admission {
            let verdict = Verdict::RateLimited { wait_secs };
            info!(session = session_id, wait_secs, %verdict, "request refused");
            return Ok(verdict.refusal().unwrap_or_default());
        }

        self.reaper
            .maybe_reclaim(
                session_id,
                self.policy.reaper_denominator,
                self.policy.reaper_age_secs,
            )
            .await?;

        self.store.append(session_id, Role::User, question).await?;
        self.activity.touch(session_id).await?;
        self.limiter
            .record_usage(session_id, addr_fingerprint, self.policy.rate_limit_mode)
            .await?;

        let history = self.store.read_all(session_id).await?;
        self.store
            .evict_to_budget(session_id, self.policy.byte_budget)
            .await?;

        let transcript: Vec<&str> = history.iter().map(|m| m.text.as_str()).collect();
        debug!(
            session = session_id,
            turns = transcript.len(),
            "assembling prompt from history"
        );
        let prompt = format!("{}\n{}", self.provider.preamble()?, transcript.join("\n"));

        let reply = self.responder.complete(session_id, &prompt).await?;
        self.store.append(session_id, Role::Ai, &reply).await?;

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool, max_len: usize) -> Settings {
        Settings {
            chatbot_enabled: enabled,
            max_question_length: max_len,
            rate_limit_count: 10,
            rate_limit_delay_ms: 120_000,
            false_response_mode: false,
        }
    }

    #[test]
    fn disabled_wins_over_everything() {
        let verdict = screen("", &settings(false, 10));
        assert_eq!(verdict, Verdict::Disabled);
    }

    #[test]
    fn empty_input_is_detected_after_trim() {
        assert_eq!(screen("   \t ", &settings(true, 10)), Verdict::EmptyInput);
        assert_eq!(screen("", &settings(true, 10)), Verdict::EmptyInput);
    }

    #[test]
    fn over_length_input_reports_the_limit() {
        let verdict = screen("aaaaaa", &settings(true, 5));
        assert_eq!(verdict, Verdict::TooLong { max: 5 });
        assert!(verdict.refusal().unwrap().contains(">5 characters"));
    }

    #[test]
    fn input_at_the_limit_is_admitted() {
        assert_eq!(screen("aaaaa", &settings(true, 5)), Verdict::Admitted);
        assert!(!Verdict::Admitted.is_terminal());
        assert!(Verdict::Admitted.refusal().is_none());
    }

    #[test]
    fn rate_limited_refusal_names_the_wait() {
        let verdict = Verdict::RateLimited { wait_secs: 17 };
        assert!(verdict.is_terminal());
        assert!(verdict.refusal().unwrap().contains("17 seconds"));
    }
}
