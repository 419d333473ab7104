use std::io::BufRead;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn};

use chatbot::config::{check_endpoint, read_api_key, ChatbotConfig};
use chatbot::knowledge::{check_resume_source, ResumeKnowledge, TextProvider};
use chatbot::pipeline::{ChatPolicy, Chatbot};
use chatbot::responder::{CannedResponder, OpenAiResponder, Responder};
use chatbot::settings;
use gatekeeper::Db;

/// Resume chatbot. With all three positional arguments it answers one
/// question (batch mode); with none it reads questions from stdin until
/// end-of-input (interactive mode).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Opaque session identifier supplied by the caller.
    session_id: Option<String>,

    /// Opaque network-address fingerprint supplied by the caller.
    addr_fingerprint: Option<String>,

    /// The question to answer.
    question: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let interactive = args.session_id.is_none();
    let default_level = if interactive { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let config = ChatbotConfig::default();

    // Fail early, before any request is served.
    let initial_settings = settings::load(&config.settings_path)?;
    check_resume_source(&config.resume_path)?;

    let db = Db::connect(&config.db_url).await?;
    db.ensure_schema().await?;
    let db = db.shared();

    let responder: Box<dyn Responder> = if initial_settings.false_response_mode {
        warn!("false-response-mode is on; replies are canned");
        Box::new(CannedResponder::new())
    } else {
        let api_key = read_api_key(&config.api_key_path)?;
        Box::new(OpenAiResponder::new(
            &config.llm_url,
            &api_key,
            &config.llm_model,
        )?)
    };

    let provider: Box<dyn TextProvider> =
        Box::new(ResumeKnowledge::new(&config.resume_path, &config.subject));

    let chatbot = Chatbot::new(db, responder, provider, ChatPolicy::default());

    match (args.session_id, args.addr_fingerprint, args.question) {
        (Some(session_id), Some(addr_fingerprint), Some(question)) => {
            let reply = chatbot
                .answer(&session_id, &addr_fingerprint, &question, &initial_settings)
                .await?;
            println!("{reply}");
        }
        (None, None, None) => {
            run_interactive(&chatbot, &config).await?;
        }
        _ => {
            bail!("wrong format: expected {{session-id}} {{addr-fingerprint}} \"{{question}}\", or no arguments for interactive mode");
        }
    }

    Ok(())
}

/// One question per stdin line, fresh settings snapshot per turn.
async fn run_interactive(chatbot: &Chatbot, config: &ChatbotConfig) -> Result<()> {
    if !check_endpoint(&config.llm_url).await {
        warn!(url = %config.llm_url, "completion endpoint not reachable; requests may fail");
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let fake_fingerprint = uuid::Uuid::new_v4().to_string();
    info!(session = %session_id, "interactive session started");

    println!(
        "(interactive mode) Hello! I am the resume chatbot. \
         Please go ahead and ask me any questions you have about {}!",
        config.subject
    );

    for line in std::io::stdin().lock().lines() {
        let question = line?;
        let settings = settings::load(&config.settings_path)?;
        let reply = chatbot
            .answer(&session_id, &fake_fingerprint, &question, &settings)
            .await?;
        println!("{reply}");
    }

    Ok(())
}
