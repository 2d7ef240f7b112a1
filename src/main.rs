//! # Questionnaire Harness CLI (`qh`)
//!
//! ## Usage
//!
//! ```bash
//! qh --config ./config/qh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `qh ask` | Answer questions from the document directory |
//! | `qh preview <pdf>` | Print the extracted (optionally redacted) text of a PDF |
//! | `qh suggest <partial>` | Suggest questions matching partial input |
//!
//! ## Examples
//!
//! ```bash
//! # Local span-extraction model, questions from a file
//! qh ask --model mpnet --questions ./security_questions.txt
//!
//! # Hosted long-context model, JSON output
//! QH_API_KEY=... qh ask --model claude -q "Is MFA enforced?" --format json
//!
//! # Check what the redaction pass removes
//! qh preview ./uploads/policy.pdf --redact
//! ```

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use questionnaire_harness::config::load_config;
use questionnaire_harness::extract::extract_pdf_file;
use questionnaire_harness::ingest::load_questions;
use questionnaire_harness::models::ModelId;
use questionnaire_harness::orchestrator::process_security_questions;
use questionnaire_harness::redact::redact_text;
use questionnaire_harness::report::{format_json, format_markdown};
use questionnaire_harness::suggest::SuggestionIndex;
use questionnaire_harness::task::{AnalysisTask, TaskStatus};

/// Questionnaire Harness CLI: answer security questionnaires from PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults. See `config/qh.example.toml`
/// for every key.
#[derive(Parser)]
#[command(
    name = "qh",
    about = "Questionnaire Harness: answer security questionnaires from anonymized PDFs",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/qh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer questions from the document directory.
    ///
    /// Prints one record per question, in input order.
    Ask {
        /// Model id: mpnet, bart, t5, chatgpt or claude.
        #[arg(long)]
        model: String,

        /// API key for chatgpt / claude.
        #[arg(long, env = "QH_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Document directory (overrides `documents.dir`).
        #[arg(long)]
        docs: Option<PathBuf>,

        /// File with one question per line.
        #[arg(long)]
        questions: Option<PathBuf>,

        /// A question; may be repeated. Appended after `--questions`.
        #[arg(short = 'q', long = "question")]
        question: Vec<String>,

        #[arg(long, value_enum, default_value = "markdown")]
        format: OutputFormat,
    },

    /// Print the text of each page of a PDF.
    Preview {
        pdf: PathBuf,

        /// Apply the PII redaction pass.
        #[arg(long)]
        redact: bool,
    },

    /// Suggest questions containing the partial input.
    Suggest {
        partial: String,

        /// File with one question per line.
        #[arg(long)]
        questions: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            model,
            api_key,
            docs,
            questions,
            question,
            format,
        } => {
            let config = load_config(&cli.config)?;
            let model: ModelId = model.parse()?;

            let mut all_questions = match &questions {
                Some(path) => load_questions(path)?,
                None => Vec::new(),
            };
            all_questions.extend(question.into_iter().filter(|q| !q.trim().is_empty()));
            if all_questions.is_empty() {
                bail!("No questions given. Use --questions <file> or -q <question>.");
            }

            let docs = docs.unwrap_or_else(|| config.documents.dir.clone());
            let api_key = api_key.unwrap_or_default();

            let task = AnalysisTask::spawn(move || {
                process_security_questions(&config, model.as_str(), &api_key, &all_questions, &docs)
            });
            let records = match task.wait().await {
                TaskStatus::Succeeded(records) => records,
                TaskStatus::Failed(msg) => bail!("Analysis failed: {}", msg),
                TaskStatus::Pending => bail!("Analysis did not complete"),
            };

            match format {
                OutputFormat::Markdown => print!("{}", format_markdown(&records)),
                OutputFormat::Json => println!("{}", format_json(&records)?),
            }
        }
        Commands::Preview { pdf, redact } => {
            let pages = extract_pdf_file(&pdf)?;
            for (i, raw) in pages.iter().enumerate() {
                let text = if redact {
                    redact_text(raw)
                } else {
                    raw.clone()
                };
                println!("--- Page {} ---\n{}\n", i + 1, text.trim());
            }
        }
        Commands::Suggest { partial, questions } => {
            let index = SuggestionIndex::new(load_questions(&questions)?);
            for suggestion in index.suggest(&partial) {
                println!("{}", suggestion);
            }
        }
    }

    Ok(())
}
