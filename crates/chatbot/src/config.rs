//! Process configuration: completion endpoint, database URL, and file
//! locations. Everything has an env override and a local-dev default.
//!
//! Dynamic per-request settings live in [`crate::settings`]; this module
//! is the static part read once at startup.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub struct ChatbotConfig {
    /// OpenAI-compatible completions endpoint.
    pub llm_url: String,
    /// Model name sent with each completion request.
    pub llm_model: String,
    /// File holding the API key (single line, trailing newline ignored).
    pub api_key_path: PathBuf,
    /// Postgres connection string for the shared store.
    pub db_url: String,
    /// Dynamic settings file, re-read per request.
    pub settings_path: PathBuf,
    /// Resume PDF fed to the prompt preamble.
    pub resume_path: PathBuf,
    /// Name of the person the chatbot answers questions about.
    pub subject: String,
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        Self {
            llm_url: std::env::var("CHATBOT_LLM_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".into()),
            llm_model: std::env::var("CHATBOT_LLM_MODEL").unwrap_or_else(|_| "gpt-4".into()),
            api_key_path: PathBuf::from("API_KEY"),
            db_url: std::env::var("CHATBOT_DB_URL")
                .unwrap_or_else(|_| "postgres://chatbot@localhost:5432/chatbot".into()),
            settings_path: PathBuf::from("./settings"),
            resume_path: PathBuf::from("resume.pdf"),
            subject: std::env::var("CHATBOT_SUBJECT").unwrap_or_else(|_| "the candidate".into()),
        }
    }
}

/// Read and trim the API key file. An empty or missing key is fatal.
pub fn read_api_key(path: &Path) -> Result<String> {
    let key = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read API key file {}", path.display()))?;
    let key = key.trim_end_matches(['\r', '\n']).to_string();
    if key.is_empty() {
        bail!("missing API key in {}", path.display());
    }
    Ok(key)
}

/// Check if the completion endpoint is reachable (GET /models).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{url}/models");
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("API_KEY");
        std::fs::write(&path, "sk-test-key\r\n").unwrap();
        assert_eq!(read_api_key(&path).unwrap(), "sk-test-key");
    }

    #[test]
    fn empty_or_missing_key_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("API_KEY");
        std::fs::write(&path, "\n").unwrap();
        assert!(read_api_key(&path).is_err());
        assert!(read_api_key(&dir.path().join("nope")).is_err());
    }
}
