//! Rendering evidence for the summarizer and for link listings.

use std::collections::HashSet;

use crate::base::types::CommentRecord;

/// Render one record as a prompt line: `<text> : <score> : <url>`.
///
/// Newlines inside the body are folded so each record stays on one line.
pub fn evidence_line(record: &CommentRecord) -> String {
    let body = record.body.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{body} : {} : {}", record.score, record.source_url)
}

/// Render records as prompt lines, in order, without exceeding `max_chars`.
///
/// Stops at the first line that would not fit, so lower-ranked evidence is what
/// gets dropped.
pub fn format_evidence(records: &[CommentRecord], max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0;

    for record in records {
        let line = evidence_line(record);
        let separator = usize::from(!out.is_empty());
        let cost = line.chars().count() + separator;

        if used + cost > max_chars {
            break;
        }

        if separator == 1 {
            out.push('\n');
        }
        out.push_str(&line);
        used += cost;
    }

    out
}

/// Render a numbered list of at most `limit` distinct links, best first.
pub fn format_links(records: &[CommentRecord], limit: usize) -> String {
    let mut seen = HashSet::new();

    records
        .iter()
        .filter(|record| seen.insert(record.source_url.as_str()))
        .take(limit)
        .enumerate()
        .map(|(i, record)| format!("{}. <{}> ({} points)", i + 1, record.source_url, record.score))
        .collect::<Vec<_>>()
        .join("\n")
}
