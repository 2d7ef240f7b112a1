//! Concatenated corpus and approximate page locator.
//!
//! The locator records, for every page, the number of whitespace-separated
//! words that precede it in the corpus. The long-context backend compares
//! these word offsets against token ranges, so the page it reports for a
//! chunk drifts for large corpora. That approximation is kept as-is.

use crate::models::DocumentPage;

/// Where a page starts in the corpus, measured in words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub filename: String,
    pub word_offset: usize,
    pub page: u32,
}

/// All page text joined into one string, plus the page locator.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub text: String,
    pub locator: Vec<PageLocation>,
}

impl Corpus {
    /// Build the corpus from pages in order. Each page's text is followed by
    /// a single space.
    pub fn build(pages: &[DocumentPage]) -> Self {
        let mut text = String::new();
        let mut locator = Vec::with_capacity(pages.len());
        let mut word_offset = 0usize;

        for page in pages {
            text.push_str(&page.text);
            text.push(' ');
            locator.push(PageLocation {
                filename: page.source.clone(),
                word_offset,
                page: page.page,
            });
            word_offset += page.text.split_whitespace().count();
        }

        Self { text, locator }
    }

    /// Pages whose word offset falls in `[start, end)`.
    pub fn pages_in_range(&self, start: usize, end: usize) -> impl Iterator<Item = &PageLocation> {
        self.locator
            .iter()
            .filter(move |loc| start <= loc.word_offset && loc.word_offset < end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(text: &str, source: &str, n: u32) -> DocumentPage {
        DocumentPage {
            text: text.to_string(),
            source: source.to_string(),
            page: n,
        }
    }

    #[test]
    fn offsets_accumulate_word_counts() {
        let corpus = Corpus::build(&[
            page("one two three", "a.pdf", 1),
            page("four five", "a.pdf", 2),
            page("six", "b.pdf", 1),
        ]);
        assert_eq!(corpus.text, "one two three four five six ");
        let offsets: Vec<usize> = corpus.locator.iter().map(|l| l.word_offset).collect();
        assert_eq!(offsets, vec![0, 3, 5]);
        assert_eq!(corpus.locator[2].filename, "b.pdf");
    }

    #[test]
    fn range_filter_is_half_open() {
        let corpus = Corpus::build(&[
            page("a b c", "x.pdf", 1),
            page("d e", "x.pdf", 2),
            page("f", "x.pdf", 3),
        ]);
        let pages: Vec<u32> = corpus.pages_in_range(0, 3).map(|l| l.page).collect();
        assert_eq!(pages, vec![1]);
        let pages: Vec<u32> = corpus.pages_in_range(3, 10).map(|l| l.page).collect();
        assert_eq!(pages, vec![2, 3]);
    }

    #[test]
    fn empty_pages_build_empty_corpus() {
        let corpus = Corpus::build(&[]);
        assert!(corpus.text.is_empty());
        assert!(corpus.locator.is_empty());
    }
}
