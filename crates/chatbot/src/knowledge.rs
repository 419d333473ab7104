//! Prompt preamble assembly: resume extraction plus the facts section.
//!
//! `pdftotext` is a binary-only tool, so we shell out. The assembled
//! preamble is cached to `instructions.txt` alongside the binary, both
//! for inspection and so the last good preamble survives a crash.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use chrono::Local;

use crate::prompts;

/// Supplies the fixed instruction/resume/facts text. The pipeline treats
/// the result as one opaque string concatenated before the history.
pub trait TextProvider: Send + Sync {
    fn preamble(&self) -> Result<String>;
}

/// Production provider: extracts the resume PDF and assembles the full
/// instruction text on every call, so a swapped-in resume.pdf takes
/// effect without a restart.
pub struct ResumeKnowledge {
    resume_pdf: PathBuf,
    cache_path: PathBuf,
    subject: String,
}

impl ResumeKnowledge {
    pub fn new(resume_pdf: impl Into<PathBuf>, subject: impl Into<String>) -> Self {
        Self {
            resume_pdf: resume_pdf.into(),
            cache_path: PathBuf::from("instructions.txt"),
            subject: subject.into(),
        }
    }

    fn extract_resume(&self) -> Result<String> {
        if !self.resume_pdf.exists() {
            bail!("{} does not exist; aborting", self.resume_pdf.display());
        }

        let text_path = self.resume_pdf.with_extension("txt");
        let output = Command::new("pdftotext")
            .arg(&self.resume_pdf)
            .arg(&text_path)
            .output()
            .context("failed to run pdftotext. Is poppler installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("pdftotext failed: {stderr}");
        }

        std::fs::read_to_string(&text_path)
            .with_context(|| format!("failed to read {}", text_path.display()))
    }
}

impl TextProvider for ResumeKnowledge {
    fn preamble(&self) -> Result<String> {
        let resume = self.extract_resume()?;
        let text = assemble(&self.subject, &resume, &facts());

        if let Err(e) = std::fs::write(&self.cache_path, &text) {
            tracing::warn!("failed to cache preamble to {}: {e}", self.cache_path.display());
        }

        Ok(text)
    }
}

/// Facts that override anything the resume says. The date fact exists
/// because completion models tend to assume their training cutoff is
/// the present day unless told otherwise.
fn facts() -> Vec<String> {
    vec![format!(
        "The current date is {}.",
        Local::now().format("%B %-d, %Y")
    )]
}

fn assemble(subject: &str, resume: &str, facts: &[String]) -> String {
    let mut text = prompts::render(prompts::OPENING_INSTRUCTIONS, subject);
    text.push_str("\n\nBEGINNING OF RESUME SECTION\n\n");
    text.push_str(resume);
    text.push_str("\n\nEND OF RESUME SECTION\n\n");
    text.push_str("BEGINNING OF FACTS SECTION\n\n");
    text.push_str(&facts.join("\n"));
    text.push_str("\n\nEND OF FACTS SECTION\n\n");
    text.push_str(&prompts::render(prompts::CLOSING_INSTRUCTIONS, subject));
    text.push('\n');
    text
}

/// Fixed-text provider for tests and offline runs.
pub struct StaticKnowledge(pub String);

impl TextProvider for StaticKnowledge {
    fn preamble(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Fail fast at startup if the resume source is unusable.
pub fn check_resume_source(resume_pdf: &Path) -> Result<()> {
    if !resume_pdf.exists() {
        bail!("{} does not exist; aborting", resume_pdf.display());
    }
    Ok(())
}
