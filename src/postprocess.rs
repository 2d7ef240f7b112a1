//! Cleanup of extractive answers into a presentable sentence.
//!
//! The order of operations matters:
//!
//! 1. strip a leading `##` word-piece artifact,
//! 2. lowercase, then remove the first occurrence of the question,
//! 3. split into sentences,
//! 4. keep sentences with more than five words that contain a question word,
//! 5. with nothing kept, fall back to the first two raw sentences,
//! 6. summarize to two sentences when the kept text is over the word limit,
//! 7. capitalize and terminate with a period.
//!
//! Step 5 returns early and skips capitalization. Joining the fallback
//! sentences with `". "` and only appending a period when more than two
//! sentences existed are both long-standing output quirks and are kept.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::config::SearchConfig;

static WORDPIECE_ARTIFACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\w*").expect("valid artifact regex"));

/// Lowercased abbreviations that end in a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "inc", "ltd", "co", "corp",
    "e.g", "i.e", "approx", "fig",
];

/// English stopwords, as shipped with the NLTK stopword corpus.
const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

static STOPWORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOPWORDS.iter().copied().collect());

/// Post-process an extractive answer for `question`.
pub fn post_process_answer(answer: &str, question: &str, config: &SearchConfig) -> String {
    let answer = WORDPIECE_ARTIFACT.replace(answer, "");
    let answer = answer.trim().to_lowercase();
    let question_lower = question.to_lowercase();
    let answer = answer.replacen(&question_lower, "", 1);
    let answer = answer.trim();

    let sentences = split_sentences(answer);
    let question_words: Vec<&str> = question_lower.split_whitespace().collect();

    let filtered: Vec<&str> = sentences
        .iter()
        .copied()
        .filter(|s| {
            let lower = s.to_lowercase();
            s.split_whitespace().count() > 5 && question_words.iter().any(|w| lower.contains(w))
        })
        .collect();

    if filtered.is_empty() {
        let head: Vec<&str> = sentences.iter().copied().take(2).collect();
        let mut out = head.join(". ");
        if sentences.len() > 2 {
            out.push('.');
        }
        return out;
    }

    let mut relevant = filtered.join(" ");
    if relevant.split_whitespace().count() > config.summary_word_limit {
        relevant = summarize_text(&relevant, config.summary_sentences);
    }

    let mut relevant = capitalize(&relevant);
    if !relevant.ends_with('.') {
        relevant.push('.');
    }
    relevant
}

/// Extractive summary: the `num_sentences` sentences with the highest summed
/// non-stopword frequency, in their original order.
pub fn summarize_text(text: &str, num_sentences: usize) -> String {
    let sentences = split_sentences(text);

    let mut word_freq: HashMap<String, usize> = HashMap::new();
    for word in word_tokens(&text.to_lowercase()) {
        if !STOPWORD_SET.contains(word.as_str()) {
            *word_freq.entry(word).or_insert(0) += 1;
        }
    }

    // Sentences with no scored word never enter the ranking.
    let mut scored: Vec<(usize, usize)> = Vec::new();
    for (i, sentence) in sentences.iter().enumerate() {
        let mut score = None;
        for word in word_tokens(&sentence.to_lowercase()) {
            if let Some(freq) = word_freq.get(&word) {
                *score.get_or_insert(0) += freq;
            }
        }
        if let Some(score) = score {
            scored.push((i, score));
        }
    }

    // Stable sort keeps earlier sentences ahead on ties.
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    let mut top: Vec<usize> = scored.iter().take(num_sentences).map(|(i, _)| *i).collect();
    top.sort_unstable();

    top.iter()
        .map(|&i| sentences[i])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split text into trimmed sentences, keeping terminal punctuation.
///
/// A sentence ends at `.`, `!` or `?` (plus any closing quotes or brackets)
/// followed by whitespace or the end of input, unless the period closes a
/// known abbreviation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if matches!(c, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < chars.len() && matches!(chars[j].1, '.' | '!' | '?' | '"' | '\'' | ')' | ']') {
                j += 1;
            }
            let at_boundary = j == chars.len() || chars[j].1.is_whitespace();
            let number_follows = chars[j..]
                .iter()
                .find(|(_, ch)| !ch.is_whitespace())
                .is_some_and(|(_, ch)| ch.is_ascii_digit());
            if at_boundary && !(c == '.' && ends_with_abbreviation(&text[start..pos], number_follows)) {
                let end = if j == chars.len() { text.len() } else { chars[j].0 };
                push_trimmed(&mut sentences, &text[start..end]);
                start = end;
            }
            i = j;
            continue;
        }
        i += 1;
    }
    push_trimmed(&mut sentences, &text[start..]);
    sentences
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

/// "no" only abbreviates "number" when a digit follows ("No. 5").
fn ends_with_abbreviation(before_period: &str, number_follows: bool) -> bool {
    let last = before_period
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_start_matches(['(', '"', '\''])
        .to_lowercase();
    ABBREVIATIONS.contains(&last.as_str()) || (number_follows && last == "no")
}

/// Word tokens: runs of alphanumerics (with inner apostrophes, hyphens and
/// periods), every other non-space character standing alone.
pub fn word_tokens(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        let joins_word = matches!(c, '\'' | '-' | '.')
            && !current.is_empty()
            && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
        if c.is_alphanumeric() || c == '_' || joins_word {
            current.push(c);
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Uppercase the first character and lowercase the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.as_str().to_lowercase().chars())
            .collect(),
        None => String::new(),
    }
}
