//! Document loading: PDF directory → normalized [`DocumentPage`]s.
//!
//! Scans the top level of the document directory for `*.pdf` files, extracts
//! text page by page, optionally redacts it, and normalizes whitespace and
//! punctuation. PDFs that fail to parse are logged and skipped; a missing
//! directory is an error.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::extract::extract_pdf_file;
use crate::models::DocumentPage;
use crate::redact::redact_text;

static DISALLOWED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,?!]").expect("valid character filter"));

static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strip everything except word characters, whitespace and `.,?!`, then
/// collapse whitespace runs to a single space.
pub fn preprocess_text(text: &str) -> String {
    let kept = DISALLOWED_CHARS.replace_all(text, "");
    WHITESPACE_RUNS.replace_all(&kept, " ").trim().to_string()
}

/// Load every PDF page under `dir`.
///
/// Files are visited in name order. Pages whose normalized text is empty are
/// dropped, so an empty result means there is nothing to answer from.
pub fn load_documents(dir: &Path, redact: bool) -> Result<Vec<DocumentPage>> {
    if !dir.is_dir() {
        bail!("Document directory does not exist: {}", dir.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".pdf") {
            files.push((name, entry.into_path()));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut pages = Vec::new();
    for (name, path) in files {
        info!(file = %path.display(), "Reading document");
        let raw_pages = match extract_pdf_file(&path) {
            Ok(p) => p,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Skipping unreadable PDF");
                continue;
            }
        };
        let before = pages.len();
        pages.extend(pages_from_text(&name, raw_pages, redact));
        debug!(file = %name, pages = pages.len() - before, "Extracted pages");
    }

    Ok(pages)
}

/// Turn raw per-page text into normalized pages numbered from 1.
pub fn pages_from_text(source: &str, raw_pages: Vec<String>, redact: bool) -> Vec<DocumentPage> {
    raw_pages
        .into_iter()
        .enumerate()
        .filter_map(|(i, raw)| {
            let raw = if redact { redact_text(&raw) } else { raw };
            let text = preprocess_text(&raw);
            if text.is_empty() {
                return None;
            }
            Some(DocumentPage {
                text,
                source: source.to_string(),
                page: i as u32 + 1,
            })
        })
        .collect()
}

/// Read a questions file: one question per non-blank line, trimmed.
pub fn load_questions(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read questions file: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_strips_symbols_and_collapses_space() {
        assert_eq!(
            preprocess_text("  Port: 80/tcp\n\n(blocked) — see §4!  "),
            "Port 80tcp blocked see 4!"
        );
    }

    #[test]
    fn preprocess_keeps_sentence_punctuation() {
        assert_eq!(preprocess_text("Yes. No, maybe? Fine!"), "Yes. No, maybe? Fine!");
    }

    #[test]
    fn pages_are_numbered_from_one_and_empty_pages_dropped() {
        let pages = pages_from_text(
            "a.pdf",
            vec!["first page".into(), "  \n ".into(), "third page".into()],
            false,
        );
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page, 1);
        assert_eq!(pages[1].page, 3);
        assert_eq!(pages[1].source, "a.pdf");
    }

    #[test]
    fn redaction_runs_before_normalization() {
        let pages = pages_from_text("a.pdf", vec!["mail ops@example.com".into()], true);
        assert_eq!(pages[0].text, "mail EMAIL");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = load_documents(Path::new("/nonexistent/docs"), false).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn empty_directory_yields_no_pages() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pages = load_documents(tmp.path(), false).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn non_pdf_and_broken_pdf_files_are_skipped() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "not a pdf").unwrap();
        std::fs::write(tmp.path().join("broken.pdf"), "not really a pdf").unwrap();
        let pages = load_documents(tmp.path(), false).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn questions_file_skips_blank_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("questions.txt");
        std::fs::write(&path, "  Do you encrypt data?  \n\n\nIs MFA enforced?\n").unwrap();
        let qs = load_questions(&path).unwrap();
        assert_eq!(qs, vec!["Do you encrypt data?", "Is MFA enforced?"]);
    }
}
