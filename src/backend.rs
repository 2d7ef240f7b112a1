//! Answering backends.
//!
//! A [`Backend`] turns an ordered question list plus the loaded pages into
//! one [`AnswerRecord`] per question, in input order. The variant is chosen
//! from the [`ModelId`]:
//!
//! | Variant | Model ids | Strategy |
//! |---------|-----------|----------|
//! | [`Backend::Extractive`] | `mpnet`, `bart`, `t5` | sliding-window search + post-processing |
//! | [`Backend::DirectChat`] | `chatgpt` | one chat request per question, full corpus |
//! | [`Backend::LongContext`] | `claude` | token-budgeted chunks, all open questions per chunk |
//!
//! Failures of a single unit of work (window, chunk, question request) are
//! logged and never abort the call.

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{error, info, warn};

use crate::answerer::{load_local_model, ExtractiveAnswerer};
use crate::chunk::chunk_text;
use crate::config::{Config, SearchConfig};
use crate::corpus::Corpus;
use crate::hosted::{AnthropicClient, ChatClient, CompletionRequest, OpenAiChatClient};
use crate::models::{AnswerRecord, DocumentPage, ModelId, NOT_AVAILABLE, NO_ANSWER_SENTINEL};
use crate::postprocess::post_process_answer;
use crate::search::find_best_answer;
use crate::tokens::{build_counter, TokenCounter};

/// Answer text for the extractive path when no window produced anything.
pub const NO_EXTRACTIVE_ANSWER: &str = "No relevant answer found in the provided documents.";

/// Phrase the long-context model uses to decline a question for one chunk.
pub const DECLINE_PHRASE: &str = "No relevant information in this chunk";

const LONG_CONTEXT_SYSTEM_PROMPT: &str = "You are an AI assistant tasked with answering questions \
based on the provided context. The context is a chunk of a larger document, so some questions may \
not have answers in this specific chunk. If you can't find a relevant answer in this chunk, simply \
state 'No relevant information in this chunk.' and move to the next question. Do not make up \
information or guess. Always include the source document name and page number in your answer.";

const LONG_CONTEXT_INSTRUCTIONS: &str = "Please answer each question based solely on the \
information provided in the context. If the answer is found, provide it along with the specific \
document name and page number where the information was found. Use the format 'Source: \
[Document Name], Page: [Page Number]' at the end of each answer.";

const DIRECT_CHAT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant answering questions based on the given context.";

static SOURCE_CAPTURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Source: (.*?), Page: (\d+)").expect("valid source regex"));

static SOURCE_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Source: .*?, Page: \d+").expect("valid source regex"));

/// The three answering strategies.
pub enum Backend {
    Extractive(ExtractiveBackend),
    DirectChat(DirectChatBackend),
    LongContext(LongContextBackend),
}

impl Backend {
    /// Build the backend for `model_id`. Local models are loaded here, once,
    /// and reused for every question.
    pub fn build(model_id: ModelId, credentials: &str, config: &Config) -> Result<Self> {
        match model_id {
            ModelId::Mpnet | ModelId::Bart | ModelId::T5 => {
                let model = load_local_model(model_id, &config.models)?;
                Ok(Backend::Extractive(ExtractiveBackend::new(
                    ExtractiveAnswerer::new(model),
                    config.search.clone(),
                )))
            }
            ModelId::ChatGpt => Ok(Backend::DirectChat(DirectChatBackend::new(Box::new(
                OpenAiChatClient::new(credentials, &config.hosted)?,
            )))),
            ModelId::Claude => Ok(Backend::LongContext(LongContextBackend::new(
                Box::new(AnthropicClient::new(credentials, &config.hosted)?),
                build_counter(&config.chunking)?,
                config.chunking.max_tokens,
                config.hosted.max_tokens,
            ))),
        }
    }

    pub fn answer(
        &self,
        questions: &[String],
        pages: &[DocumentPage],
        corpus: &Corpus,
    ) -> Result<Vec<AnswerRecord>> {
        match self {
            Backend::Extractive(b) => Ok(b.answer(questions, pages)),
            Backend::DirectChat(b) => Ok(b.answer(questions, corpus)),
            Backend::LongContext(b) => b.answer(questions, corpus),
        }
    }
}

// ─── Extractive ────────────────────────────────────────────────────────────

pub struct ExtractiveBackend {
    answerer: ExtractiveAnswerer,
    search: SearchConfig,
}

impl ExtractiveBackend {
    pub fn new(answerer: ExtractiveAnswerer, search: SearchConfig) -> Self {
        Self { answerer, search }
    }

    /// Search every page for each question in turn.
    pub fn answer(&self, questions: &[String], pages: &[DocumentPage]) -> Vec<AnswerRecord> {
        questions
            .iter()
            .map(|question| {
                info!(question = %question, "Processing question");
                let best = find_best_answer(&self.answerer, question, pages, &self.search);
                let processed = post_process_answer(&best.answer, question, &self.search);

                let answer = if processed.is_empty() {
                    NO_EXTRACTIVE_ANSWER.to_string()
                } else {
                    processed
                };
                let source = if best.source.is_empty() {
                    NOT_AVAILABLE.to_string()
                } else {
                    format!("{}, Page: {}", best.source, best.page)
                };
                let citation = if best.citation.is_empty() {
                    NOT_AVAILABLE.to_string()
                } else {
                    format!("\"<i>{}</i>\"", best.citation)
                };
                AnswerRecord::new(question.as_str(), answer, source, citation)
            })
            .collect()
    }
}

// ─── Direct chat ───────────────────────────────────────────────────────────

pub struct DirectChatBackend {
    client: Box<dyn ChatClient>,
}

impl DirectChatBackend {
    pub fn new(client: Box<dyn ChatClient>) -> Self {
        Self { client }
    }

    /// One request per question with the whole corpus as context. A failed
    /// request yields the sentinel record for that question only.
    pub fn answer(&self, questions: &[String], corpus: &Corpus) -> Vec<AnswerRecord> {
        let model = self.client.model().to_string();
        questions
            .iter()
            .map(|question| {
                let request = CompletionRequest {
                    system: DIRECT_CHAT_SYSTEM_PROMPT.to_string(),
                    user: format!("Context: {}\n\nQuestion: {}", corpus.text, question),
                    max_tokens: None,
                };
                match self.client.complete(&request) {
                    Ok(reply) => AnswerRecord::new(
                        question.as_str(),
                        reply.trim(),
                        model.as_str(),
                        format!("Generated by {} based on the provided context.", model),
                    ),
                    Err(e) => {
                        error!(question = %question, error = %e, "Chat request failed");
                        AnswerRecord::new(
                            question.as_str(),
                            NO_ANSWER_SENTINEL,
                            NOT_AVAILABLE,
                            NOT_AVAILABLE,
                        )
                    }
                }
            })
            .collect()
    }
}

// ─── Long context ──────────────────────────────────────────────────────────

pub struct LongContextBackend {
    client: Box<dyn ChatClient>,
    counter: Box<dyn TokenCounter>,
    max_tokens: usize,
    reply_tokens: u32,
}

impl LongContextBackend {
    pub fn new(
        client: Box<dyn ChatClient>,
        counter: Box<dyn TokenCounter>,
        max_tokens: usize,
        reply_tokens: u32,
    ) -> Self {
        Self {
            client,
            counter,
            max_tokens,
            reply_tokens,
        }
    }

    /// Ask every still-open question of each chunk in turn; the first chunk
    /// to answer a question wins. Questions nobody answered get the sentinel.
    pub fn answer(&self, questions: &[String], corpus: &Corpus) -> Result<Vec<AnswerRecord>> {
        let chunks = chunk_text(&corpus.text, self.max_tokens, self.counter.as_ref())?;
        info!(chunks = chunks.len(), questions = questions.len(), "Chunked corpus");

        let mut results: Vec<AnswerRecord> = questions
            .iter()
            .map(|q| AnswerRecord::new(q.as_str(), "", "", ""))
            .collect();

        for (i, chunk) in chunks.iter().enumerate() {
            if results.iter().all(|r| !r.answer.is_empty()) {
                break;
            }
            let request = CompletionRequest {
                system: LONG_CONTEXT_SYSTEM_PROMPT.to_string(),
                user: chunk_message(&results, corpus, chunk, i, chunks.len(), self.max_tokens),
                max_tokens: Some(self.reply_tokens),
            };
            match self.client.complete(&request) {
                Ok(reply) => {
                    let filled = apply_chunk_response(&mut results, &reply, i);
                    info!(chunk = i + 1, answered = filled, "Chunk processed");
                }
                Err(e) => {
                    error!(chunk = i + 1, error = %e, "Long-context request failed");
                }
            }
        }

        Ok(results
            .into_iter()
            .map(|r| {
                if r.answer.is_empty() {
                    AnswerRecord::sentinel(r.question)
                } else {
                    r
                }
            })
            .collect())
    }
}

/// User message for chunk `index` of `total`: the chunk text, the pages the
/// locator places in it, and every open question numbered by its position
/// in the full list.
pub fn chunk_message(
    results: &[AnswerRecord],
    corpus: &Corpus,
    chunk: &str,
    index: usize,
    total: usize,
    max_tokens: usize,
) -> String {
    let questions_text = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.answer.is_empty())
        .map(|(j, r)| format!("{}. {}", j + 1, r.question))
        .collect::<Vec<_>>()
        .join("\n");

    // Word offsets compared against a token range; see `corpus`.
    let range_start = index * max_tokens;
    let range_end = (index + 1) * max_tokens;
    let pdf_info_text = corpus
        .pages_in_range(range_start, range_end)
        .map(|loc| format!("Document: {}, Page: {}", loc.filename, loc.page))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Context (chunk {} of {}):\n{}\n\nPDF Information:\n{}\n\nQuestions:\n{}\n\n{}",
        index + 1,
        total,
        chunk,
        pdf_info_text,
        questions_text,
        LONG_CONTEXT_INSTRUCTIONS
    )
}

/// Merge one chunk reply into `results` and return how many questions it
/// answered.
///
/// The reply is split into blank-line separated paragraphs of the form
/// `<n>. <answer>`. Paragraph `n` fills question `n - 1` when that question
/// is still open and the answer is not the decline phrase. Paragraphs without
/// a positive integer prefix are ignored.
pub fn apply_chunk_response(results: &mut [AnswerRecord], response: &str, chunk_index: usize) -> usize {
    let mut filled = 0;
    for paragraph in response.trim().split("\n\n") {
        let Some((number, answer_text)) = paragraph.split_once(". ") else {
            continue;
        };
        let index = match number.trim().parse::<usize>() {
            Ok(n) if n >= 1 => n - 1,
            _ => {
                warn!(chunk = chunk_index + 1, prefix = %number, "Skipping unnumbered paragraph");
                continue;
            }
        };
        let Some(slot) = results.get_mut(index) else {
            continue;
        };
        if !slot.answer.is_empty() || answer_text.contains(DECLINE_PHRASE) {
            continue;
        }

        let (answer, source) = match SOURCE_CAPTURE.captures(answer_text) {
            Some(caps) => (
                SOURCE_PHRASE.replace_all(answer_text, "").trim().to_string(),
                format!("{}, Page: {}", &caps[1], &caps[2]),
            ),
            None => (
                answer_text.to_string(),
                format!("Information found in chunk {}", chunk_index + 1),
            ),
        };

        slot.citation = format!("\"{}\"", answer);
        slot.answer = answer;
        slot.source = source;
        if !slot.answer.is_empty() {
            filled += 1;
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answerer::QaModel;
    use crate::models::{Span, NO_ANSWER_CITATION};
    use crate::tokens::CharRatioCounter;
    use anyhow::bail;
    use std::sync::Mutex;

    /// Replays scripted replies and records every request it receives.
    struct FakeChat {
        replies: Mutex<Vec<Result<String>>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeChat {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChatClient for FakeChat {
        fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                bail!("no scripted reply");
            }
            replies.remove(0)
        }

        fn model(&self) -> &str {
            "fake-chat"
        }
    }

    impl ChatClient for std::sync::Arc<FakeChat> {
        fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.as_ref().complete(request)
        }

        fn model(&self) -> &str {
            self.as_ref().model()
        }
    }

    fn questions(qs: &[&str]) -> Vec<String> {
        qs.iter().map(|q| q.to_string()).collect()
    }

    fn open(qs: &[&str]) -> Vec<AnswerRecord> {
        qs.iter().map(|q| AnswerRecord::new(*q, "", "", "")).collect()
    }

    fn page(text: &str, source: &str, n: u32) -> DocumentPage {
        DocumentPage {
            text: text.to_string(),
            source: source.to_string(),
            page: n,
        }
    }

    #[test]
    fn parses_numbered_answer_with_source() {
        let mut results = open(&["Q1", "Q2"]);
        let filled = apply_chunk_response(
            &mut results,
            "1. Answer one Source: doc.pdf, Page: 2\n\n2. No relevant information in this chunk.",
            0,
        );
        assert_eq!(filled, 1);
        assert_eq!(results[0].answer, "Answer one");
        assert_eq!(results[0].source, "doc.pdf, Page: 2");
        assert_eq!(results[0].citation, "\"Answer one\"");
        assert!(results[1].answer.is_empty());
    }

    #[test]
    fn missing_source_names_the_chunk() {
        let mut results = open(&["Q1"]);
        apply_chunk_response(&mut results, "1. Logs are kept for a year.", 2);
        assert_eq!(results[0].answer, "Logs are kept for a year.");
        assert_eq!(results[0].source, "Information found in chunk 3");
    }

    #[test]
    fn answered_questions_are_not_overwritten() {
        let mut results = open(&["Q1"]);
        apply_chunk_response(&mut results, "1. First Source: a.pdf, Page: 1", 0);
        apply_chunk_response(&mut results, "1. Second Source: b.pdf, Page: 9", 1);
        assert_eq!(results[0].answer, "First");
        assert_eq!(results[0].source, "a.pdf, Page: 1");
    }

    #[test]
    fn global_numbering_and_out_of_range_indices() {
        let mut results = open(&["Q1", "Q2", "Q3"]);
        apply_chunk_response(&mut results, "3. Third answer\n\n7. Nobody asked\n\n0. zero", 0);
        assert!(results[0].answer.is_empty());
        assert_eq!(results[2].answer, "Third answer");
    }

    #[test]
    fn unnumbered_paragraphs_are_skipped() {
        let mut results = open(&["Q1", "Q2"]);
        let reply = "Here are the answers. Enjoy\n\nnot a list\n\n2. MFA is enforced. Source: sec.pdf, Page: 4";
        apply_chunk_response(&mut results, reply, 0);
        assert!(results[0].answer.is_empty());
        assert_eq!(results[1].answer, "MFA is enforced.");
        assert_eq!(results[1].source, "sec.pdf, Page: 4");
    }

    #[test]
    fn every_source_phrase_is_removed() {
        let mut results = open(&["Q1"]);
        apply_chunk_response(
            &mut results,
            "1. Yes Source: a.pdf, Page: 1 and also Source: b.pdf, Page: 2",
            0,
        );
        assert_eq!(results[0].answer, "Yes  and also");
        assert_eq!(results[0].source, "a.pdf, Page: 1");
    }

    #[test]
    fn chunk_message_lists_open_questions_and_pages() {
        let corpus = Corpus::build(&[page("one two", "a.pdf", 1), page("three", "b.pdf", 5)]);
        let mut results = open(&["Q1", "Q2"]);
        results[0].answer = "done".to_string();
        let msg = chunk_message(&results, &corpus, "chunk body", 0, 2, 90_000);
        assert!(msg.starts_with("Context (chunk 1 of 2):\nchunk body\n\nPDF Information:\n"));
        assert!(msg.contains("Document: a.pdf, Page: 1\nDocument: b.pdf, Page: 5"));
        assert!(msg.contains("Questions:\n2. Q2\n\n"));
        assert!(!msg.contains("1. Q1"));
        assert!(msg.ends_with("'Source: [Document Name], Page: [Page Number]' at the end of each answer."));
    }

    #[test]
    fn second_chunk_locator_range_excludes_first_pages() {
        let corpus = Corpus::build(&[page("a b c d", "a.pdf", 1), page("e", "a.pdf", 2)]);
        let msg = chunk_message(&open(&["Q"]), &corpus, "c", 1, 2, 3);
        assert!(msg.contains("PDF Information:\nDocument: a.pdf, Page: 2\n\n"));
    }

    #[test]
    fn long_context_scenario_falls_through_to_sentinel() {
        let chat = FakeChat::new(vec![Ok(
            "1. Answer one Source: doc.pdf, Page: 2\n\n2. No relevant information in this chunk."
                .to_string(),
        )]);
        let backend = LongContextBackend::new(Box::new(chat), Box::new(CharRatioCounter), 90_000, 3000);
        let corpus = Corpus::build(&[page("some policy text", "doc.pdf", 2)]);
        let records = backend.answer(&questions(&["Q1", "Q2"]), &corpus).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].question, "Q1");
        assert_eq!(records[0].source, "doc.pdf, Page: 2");
        assert_eq!(records[1].question, "Q2");
        assert_eq!(records[1].answer, NO_ANSWER_SENTINEL);
        assert_eq!(records[1].source, NOT_AVAILABLE);
        assert_eq!(records[1].citation, NO_ANSWER_CITATION);
    }

    #[test]
    fn failing_chunk_is_swallowed_and_later_chunk_answers() {
        let chat = std::sync::Arc::new(FakeChat::new(vec![
            Err(anyhow::anyhow!("HTTP 529")),
            Ok("1. Found later Source: b.pdf, Page: 3".to_string()),
        ]));
        // Budget of 2 tokens (8 chars) forces one chunk per paragraph.
        let backend = LongContextBackend::new(
            Box::new(chat.clone()),
            Box::new(CharRatioCounter),
            2,
            3000,
        );
        let corpus = Corpus {
            text: "first\n\nsecond".to_string(),
            locator: Vec::new(),
        };
        let records = backend.answer(&questions(&["Q1"]), &corpus).unwrap();
        assert_eq!(records[0].answer, "Found later");
        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].user.starts_with("Context (chunk 2 of 2):\nsecond"));
        assert_eq!(seen[1].max_tokens, Some(3000));
    }

    #[test]
    fn answered_questions_drop_out_of_later_chunks() {
        let chat = std::sync::Arc::new(FakeChat::new(vec![
            Ok("1. One".to_string()),
            Ok("2. Two".to_string()),
        ]));
        let backend = LongContextBackend::new(
            Box::new(chat.clone()),
            Box::new(CharRatioCounter),
            2,
            3000,
        );
        let corpus = Corpus {
            text: "first\n\nsecond\n\nthird".to_string(),
            locator: Vec::new(),
        };
        let records = backend.answer(&questions(&["Q1", "Q2"]), &corpus).unwrap();
        assert_eq!(records[0].answer, "One");
        assert_eq!(records[1].answer, "Two");
        let seen = chat.seen.lock().unwrap();
        // Everything answered after chunk 2; chunk 3 is never sent.
        assert_eq!(seen.len(), 2);
        assert!(seen[1].user.contains("Questions:\n2. Q2\n\n"));
    }

    #[test]
    fn direct_chat_uses_model_name_and_survives_failures() {
        let chat = FakeChat::new(vec![
            Ok("  Encrypted with AES.  ".to_string()),
            Err(anyhow::anyhow!("timeout")),
        ]);
        let backend = DirectChatBackend::new(Box::new(chat));
        let corpus = Corpus::build(&[page("data is encrypted", "a.pdf", 1)]);
        let records = backend.answer(&questions(&["Encrypted?", "Backups?"]), &corpus);
        assert_eq!(records[0].answer, "Encrypted with AES.");
        assert_eq!(records[0].source, "fake-chat");
        assert_eq!(
            records[0].citation,
            "Generated by fake-chat based on the provided context."
        );
        assert_eq!(records[1].question, "Backups?");
        assert_eq!(records[1].answer, NO_ANSWER_SENTINEL);
    }

    #[test]
    fn direct_chat_sends_full_context() {
        let chat = std::sync::Arc::new(FakeChat::new(vec![Ok("ok".to_string())]));
        let backend = DirectChatBackend::new(Box::new(chat.clone()));
        let corpus = Corpus::build(&[page("alpha", "a.pdf", 1), page("beta", "a.pdf", 2)]);
        backend.answer(&questions(&["Q?"]), &corpus);
        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen[0].user, "Context: alpha beta \n\nQuestion: Q?");
        assert_eq!(seen[0].system, DIRECT_CHAT_SYSTEM_PROMPT);
    }

    struct Nothing;

    impl QaModel for Nothing {
        fn answer(&self, _q: &str, _c: &str) -> Result<Span> {
            Ok(Span::empty())
        }
    }

    struct WholeWindow;

    impl QaModel for WholeWindow {
        fn answer(&self, _q: &str, context: &str) -> Result<Span> {
            Ok(Span::new(context, 0, context.chars().count()))
        }
    }

    #[test]
    fn extractive_without_findings_reports_no_answer() {
        let backend = ExtractiveBackend::new(
            ExtractiveAnswerer::new(Box::new(Nothing)),
            SearchConfig::default(),
        );
        let records = backend.answer(&questions(&["Q1"]), &[page("text", "a.pdf", 1)]);
        assert_eq!(records[0].answer, NO_EXTRACTIVE_ANSWER);
        assert_eq!(records[0].source, NOT_AVAILABLE);
        assert_eq!(records[0].citation, NOT_AVAILABLE);
    }

    #[test]
    fn extractive_formats_source_and_citation() {
        let backend = ExtractiveBackend::new(
            ExtractiveAnswerer::new(Box::new(WholeWindow)),
            SearchConfig::default(),
        );
        let text = "Customer data is encrypted at rest using AES 256 keys";
        let records = backend.answer(
            &questions(&["How is customer data encrypted?"]),
            &[page(text, "sec.pdf", 7)],
        );
        assert_eq!(records[0].source, "sec.pdf, Page: 7");
        assert_eq!(records[0].citation, format!("\"<i>{}</i>\"", text));
        assert_eq!(
            records[0].answer,
            "Customer data is encrypted at rest using aes 256 keys."
        );
    }
}
