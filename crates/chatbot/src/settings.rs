//! Line-oriented settings file, re-read at the top of every pipeline
//! execution so edits take effect without a restart.
//!
//! Format is one `key=value` per line. Malformed lines and unknown keys
//! are logged and skipped; a known key with a bad value, or a missing
//! required key, is fatal.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::error;

/// Settings snapshot for one pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub chatbot_enabled: bool,
    pub max_question_length: usize,
    pub rate_limit_count: i32,
    pub rate_limit_delay_ms: i64,
    pub false_response_mode: bool,
}

/// Partially parsed settings; required keys stay `None` until seen.
#[derive(Debug, Default)]
struct Draft {
    chatbot_enabled: Option<bool>,
    max_question_length: Option<u16>,
    rate_limit_count: Option<i32>,
    rate_limit_delay_ms: Option<i64>,
    false_response_mode: Option<bool>,
}

const DEFAULT_RATE_LIMIT_COUNT: i32 = 10;
const DEFAULT_RATE_LIMIT_DELAY_MS: i64 = 120_000;

/// Read and parse the settings file.
pub fn load(path: &Path) -> Result<Settings> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    parse(&text)
}

fn parse(text: &str) -> Result<Settings> {
    let mut draft = Draft::default();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split('=').collect();
        if parts.len() != 2 {
            error!("found malformed line '{line}' in settings; skipping");
            continue;
        }
        let (key, val) = (parts[0], parts[1]);

        match key {
            "chatbot-enabled" => {
                draft.chatbot_enabled = Some(parse_value(key, val)?);
            }
            "max-question-length" => {
                draft.max_question_length = Some(parse_value(key, val)?);
            }
            "rate-limit-count" => {
                draft.rate_limit_count = Some(parse_value(key, val)?);
            }
            "rate-limit-delay-ms" => {
                draft.rate_limit_delay_ms = Some(parse_value(key, val)?);
            }
            "false-response-mode" => {
                draft.false_response_mode = Some(parse_value(key, val)?);
            }
            _ => {
                error!("found setting '{key}' with value '{val}', but it's not a valid setting");
            }
        }
    }

    let Some(chatbot_enabled) = draft.chatbot_enabled else {
        bail!("missing setting: chatbot-enabled");
    };
    let Some(max_question_length) = draft.max_question_length else {
        bail!("missing setting: max-question-length");
    };

    Ok(Settings {
        chatbot_enabled,
        max_question_length: usize::from(max_question_length),
        rate_limit_count: draft.rate_limit_count.unwrap_or(DEFAULT_RATE_LIMIT_COUNT),
        rate_limit_delay_ms: draft
            .rate_limit_delay_ms
            .unwrap_or(DEFAULT_RATE_LIMIT_DELAY_MS),
        false_response_mode: draft.false_response_mode.unwrap_or(false),
    })
}

fn parse_value<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    match val.parse() {
        Ok(v) => Ok(v),
        Err(_) => bail!("setting '{key}' has invalid value '{val}'"),
    }
}
