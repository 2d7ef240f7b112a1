//! Paragraph-boundary text chunker with a token budget.
//!
//! Splits the corpus on `\n\n` and greedily packs paragraphs into chunks
//! whose token count stays within `max_tokens`. A chunk is closed as soon as
//! the next paragraph would overflow it. A single paragraph larger than the
//! budget is never split; it becomes a chunk of its own. Empty chunks are
//! never emitted.

use anyhow::Result;

use crate::tokens::TokenCounter;

/// Split `text` into token-budgeted chunks, in corpus order.
pub fn chunk_text(text: &str, max_tokens: usize, counter: &dyn TokenCounter) -> Result<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current_buf = String::new();
    let mut current_tokens = 0usize;

    for para in text.split("\n\n") {
        let para_tokens = counter.count(para)?;

        if current_tokens + para_tokens > max_tokens {
            flush(&mut chunks, &current_buf);
            current_buf.clear();
            current_buf.push_str(para);
            current_tokens = para_tokens;
        } else {
            current_buf.push_str("\n\n");
            current_buf.push_str(para);
            current_tokens += para_tokens;
        }
    }

    flush(&mut chunks, &current_buf);
    Ok(chunks)
}

fn flush(chunks: &mut Vec<String>, buf: &str) {
    let trimmed = buf.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per whitespace-separated word.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> Result<usize> {
            Ok(text.split_whitespace().count())
        }
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 100, &WordCounter).unwrap();
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunks = chunk_text("", 100, &WordCounter).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn paragraphs_pack_until_budget() {
        let text = "a b c\n\nd e\n\nf g h i";
        let chunks = chunk_text(text, 5, &WordCounter).unwrap();
        assert_eq!(chunks, vec!["a b c\n\nd e", "f g h i"]);
    }

    #[test]
    fn exact_budget_fits() {
        let text = "a b\n\nc d";
        let chunks = chunk_text(text, 4, &WordCounter).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn oversized_paragraph_stands_alone() {
        let text = "a b\n\nc d e f g h\n\ni";
        let chunks = chunk_text(text, 3, &WordCounter).unwrap();
        assert_eq!(chunks, vec!["a b", "c d e f g h", "i"]);
    }

    #[test]
    fn oversized_first_paragraph_does_not_emit_empty_chunk() {
        let chunks = chunk_text("a b c d e", 2, &WordCounter).unwrap();
        assert_eq!(chunks, vec!["a b c d e"]);
    }

    #[test]
    fn every_chunk_within_budget_unless_single_paragraph() {
        let text = (0..40)
            .map(|i| format!("para {} has words", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = chunk_text(&text, 10, &WordCounter).unwrap();
        for c in &chunks {
            assert!(WordCounter.count(c).unwrap() <= 10, "chunk over budget: {c}");
        }
        assert_eq!(chunks.join("\n\n"), text);
    }
}
