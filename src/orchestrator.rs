//! The analysis entry point.
//!
//! [`process_security_questions`] loads the document directory, builds the
//! corpus once, picks a [`Backend`] from the model id and returns one
//! [`AnswerRecord`] per question. It never returns an error: any failure on
//! the way becomes an `Error: ...` record for every question.

use anyhow::Result;
use std::path::Path;
use tracing::{error, info, warn};

use crate::backend::Backend;
use crate::config::Config;
use crate::corpus::Corpus;
use crate::ingest::load_documents;
use crate::models::{AnswerRecord, DocumentPage, ModelId, NO_CONTENT_MESSAGE};

/// Answer `questions` from the PDFs in `document_dir` with the model named
/// by `model_id`.
///
/// The output always has one record per question, in input order.
pub fn process_security_questions(
    config: &Config,
    model_id: &str,
    credentials: &str,
    questions: &[String],
    document_dir: &Path,
) -> Vec<AnswerRecord> {
    info!(model = %model_id, questions = questions.len(), "Starting analysis");
    let result = load_documents(document_dir, config.documents.redact).and_then(|pages| {
        run_pipeline(pages, questions, || {
            let model: ModelId = model_id.parse()?;
            Backend::build(model, credentials, config)
        })
    });
    into_records(result, questions)
}

/// Answer `questions` from already-loaded pages. `build` is only called when
/// there is content to answer from.
pub fn answer_questions<F>(pages: Vec<DocumentPage>, questions: &[String], build: F) -> Vec<AnswerRecord>
where
    F: FnOnce() -> Result<Backend>,
{
    into_records(run_pipeline(pages, questions, build), questions)
}

fn run_pipeline<F>(pages: Vec<DocumentPage>, questions: &[String], build: F) -> Result<Vec<AnswerRecord>>
where
    F: FnOnce() -> Result<Backend>,
{
    if pages.is_empty() {
        warn!("No valid content found after preprocessing");
        return Ok(questions
            .iter()
            .map(|q| AnswerRecord::error(q.as_str(), NO_CONTENT_MESSAGE))
            .collect());
    }

    let corpus = Corpus::build(&pages);
    info!(pages = pages.len(), chars = corpus.text.len(), "Corpus ready");

    let backend = build()?;
    let records = backend.answer(questions, &pages, &corpus)?;
    info!("All questions processed");
    Ok(records)
}

fn into_records(result: Result<Vec<AnswerRecord>>, questions: &[String]) -> Vec<AnswerRecord> {
    match result {
        Ok(records) => records,
        Err(e) => {
            error!("Analysis failed: {:?}", e);
            let message = format!("Error: {:#}", e);
            questions
                .iter()
                .map(|q| AnswerRecord::error(q.as_str(), message.clone()))
                .collect()
        }
    }
}
