//! Rendering answer records for humans and machines.

use anyhow::Result;

use crate::models::AnswerRecord;

/// Markdown report with one numbered block per question.
pub fn format_markdown(records: &[AnswerRecord]) -> String {
    let mut out = String::from("**Analysis Results**\n");
    for (i, r) in records.iter().enumerate() {
        out.push_str(&format!("**Question {}**\n", i + 1));
        out.push_str(&format!("**Q:** {}\n", r.question));
        out.push_str(&format!("**A:** {}\n", r.answer));
        out.push_str(&format!("**Source:** {}\n", r.source));
        out.push_str(&format!("**Citation:** {}\n\n", r.citation));
    }
    out
}

/// Pretty-printed JSON array of records.
pub fn format_json(records: &[AnswerRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}
