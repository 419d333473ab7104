//! Resume chatbot: answers career questions about a fixed subject by
//! forwarding a constructed prompt to an LLM completion service.
//!
//! The interesting machinery (rate limiting, bounded history, stale
//! reclamation) lives in the `gatekeeper` crate; this crate supplies the
//! glue around it: the settings file, prompt preamble assembly, the
//! completion client, the admission pipeline, and the CLI front-end.

pub mod config;
pub mod knowledge;
pub mod pipeline;
pub mod prompts;
pub mod responder;
pub mod settings;

pub use config::ChatbotConfig;
pub use knowledge::{ResumeKnowledge, StaticKnowledge, TextProvider};
pub use pipeline::{ChatPolicy, Chatbot, Verdict};
pub use responder::{CannedResponder, OpenAiResponder, Responder, ResponderError};
pub use settings::Settings;
