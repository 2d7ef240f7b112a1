//! Sliding-window answer search over document pages.
//!
//! Each page is cut into overlapping character windows (`window_chars` long,
//! advancing by `stride_chars`). The local answerer runs on every window and
//! the answer with the highest [`relevance_score`] is kept. Comparison is
//! strictly greater-than, so the first window to reach a score keeps it.

use std::collections::HashSet;
use tracing::debug;

use crate::answerer::ExtractiveAnswerer;
use crate::config::SearchConfig;
use crate::models::DocumentPage;

/// The best answer found for one question. All fields are empty/zero when
/// no window produced a usable answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BestAnswer {
    pub answer: String,
    pub source: String,
    pub page: u32,
    pub citation: String,
}

impl BestAnswer {
    pub fn is_found(&self) -> bool {
        !self.answer.is_empty()
    }
}

/// Number of distinct lowercased whitespace tokens shared by `answer` and
/// `question`.
pub fn relevance_score(answer: &str, question: &str) -> usize {
    let answer_tokens: HashSet<String> = answer.split_whitespace().map(str::to_lowercase).collect();
    let question_tokens: HashSet<String> =
        question.split_whitespace().map(str::to_lowercase).collect();
    answer_tokens.intersection(&question_tokens).count()
}

/// `[start, end)` character ranges of the windows over a text of `len`
/// characters.
///
/// Windows start at multiples of `stride`. The last window is clamped to the
/// end of the text, and a text shorter than one window is a single window.
pub fn window_bounds(len: usize, window: usize, stride: usize) -> Vec<(usize, usize)> {
    let mut bounds = Vec::new();
    if len == 0 || window == 0 || stride == 0 {
        return bounds;
    }
    let mut start = 0;
    while start < len {
        let end = (start + window).min(len);
        bounds.push((start, end));
        if end == len {
            break;
        }
        start += stride;
    }
    bounds
}

/// The text of `context` from `pad` characters before `start` to `pad`
/// characters after `end`, clamped to the context and trimmed.
///
/// `start` and `end` are taken as character offsets whatever the model meant
/// by them.
pub fn extract_citation(context: &str, start: usize, end: usize, pad: usize) -> String {
    let chars: Vec<char> = context.chars().collect();
    let from = start.saturating_sub(pad).min(chars.len());
    let to = end.saturating_add(pad).min(chars.len());
    if from >= to {
        return String::new();
    }
    chars[from..to].iter().collect::<String>().trim().to_string()
}

/// Scan every window of every page for the best answer to `question`.
pub fn find_best_answer(
    answerer: &ExtractiveAnswerer,
    question: &str,
    pages: &[DocumentPage],
    config: &SearchConfig,
) -> BestAnswer {
    let mut best = BestAnswer::default();
    let mut best_score: Option<usize> = None;

    for page in pages {
        let chars: Vec<char> = page.text.chars().collect();
        for (start, end) in window_bounds(chars.len(), config.window_chars, config.stride_chars) {
            let context: String = chars[start..end].iter().collect();
            let span = answerer.answer(question, &context);
            if span.text.is_empty() || span.text.chars().count() <= config.min_answer_chars {
                continue;
            }

            let score = relevance_score(&span.text, question);
            if best_score.map_or(true, |b| score > b) {
                debug!(
                    source = %page.source,
                    page = page.page,
                    window = start,
                    score,
                    "New best answer"
                );
                best_score = Some(score);
                best = BestAnswer {
                    citation: extract_citation(
                        &context,
                        span.start,
                        span.end,
                        config.citation_pad_chars,
                    ),
                    answer: span.text,
                    source: page.source.clone(),
                    page: page.page,
                };
            }
        }
    }

    best
}
