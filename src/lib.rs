//! # Questionnaire Harness
//!
//! Answers security questionnaires from a directory of (already anonymized)
//! PDF documents.
//!
//! Each question gets exactly one answer record, `{question, answer, source,
//! citation}`, produced by one of three strategies selected by model id:
//! local extractive/generative QA over sliding windows, a hosted chat model
//! asked once per question, or a hosted long-context model fed the corpus in
//! token-budgeted chunks.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────┐
//! │  PDF pages   │──▶│    Corpus    │──▶│ Backend                  │
//! │ ingest/redact│   │ text+locator │   │  extractive | chat | long │
//! └──────────────┘   └──────────────┘   └────────────┬─────────────┘
//!                                                    ▼
//!                                          ┌──────────────────┐
//!                                          │  AnswerRecord[]  │
//!                                          │ markdown / json  │
//!                                          └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! qh ask --model mpnet --docs ./uploads/anonymized --questions questions.txt
//! qh ask --model claude -q "Is data encrypted at rest?" --format json
//! qh preview ./policy.pdf --redact
//! qh suggest encrypt --questions questions.txt
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and model ids |
//! | [`extract`] | PDF page text extraction |
//! | [`redact`] | Regex PII redaction |
//! | [`ingest`] | Document directory loading and normalization |
//! | [`corpus`] | Concatenated corpus and page locator |
//! | [`hub`] | Model file download cache |
//! | [`tokens`] | Token counting |
//! | [`chunk`] | Token-budgeted paragraph chunking |
//! | [`answerer`] | Local QA models |
//! | [`search`] | Sliding-window answer search |
//! | [`postprocess`] | Answer cleanup and summarization |
//! | [`hosted`] | Hosted chat API clients |
//! | [`backend`] | The three answering strategies |
//! | [`orchestrator`] | `process_security_questions` entry point |
//! | [`task`] | Background task handle |
//! | [`report`] | Markdown and JSON output |
//! | [`suggest`] | Question suggestions |

pub mod answerer;
pub mod backend;
pub mod chunk;
pub mod config;
pub mod corpus;
pub mod extract;
pub mod hosted;
pub mod hub;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod postprocess;
pub mod redact;
pub mod report;
pub mod search;
pub mod suggest;
pub mod task;
pub mod tokens;
