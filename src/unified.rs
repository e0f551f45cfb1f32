//! Text-level unified diffs and hunk header re-basing

use crate::error::{Result, RowdiffError};
use similar::TextDiff;

/// Line diff of two text blocks in unified format, hunks only (no `---`/`+++`
/// file header). Empty when the blocks are equal.
pub fn unified_diff(before: &str, after: &str, context: usize) -> String {
    let diff = TextDiff::from_lines(before, after);
    diff.unified_diff()
        .context_radius(context)
        .missing_newline_hint(false)
        .to_string()
}

fn shift_number(number: &str, offset: usize) -> Option<usize> {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    number.parse::<usize>().ok()?.checked_add(offset)
}

fn shift_range(range: &str, offset: usize) -> Option<String> {
    match range.split_once(',') {
        Some((start, len)) => {
            let start = shift_number(start, offset)?;
            shift_number(len, 0)?;
            Some(format!("{},{}", start, len))
        }
        None => shift_number(range, offset).map(|start| start.to_string()),
    }
}

/// Add `offset` to both start line numbers of a section header.
///
/// Accepts the short form `@@ -N +M @@` and the long form
/// `@@ -N,L +M,L @@`, and keeps whichever it was given, along with anything
/// after the closing `@@`.
///
/// ```
/// # use rowdiff::unified::adjust_hunk_offset;
/// assert_eq!(adjust_hunk_offset("@@ -44,7 +44,7 @@", 10).unwrap(), "@@ -54,7 +54,7 @@");
/// assert_eq!(adjust_hunk_offset("@@ -1 +0,7 @@", 10).unwrap(), "@@ -11 +10,7 @@");
/// ```
pub fn adjust_hunk_offset(header: &str, offset: usize) -> Result<String> {
    let malformed = || RowdiffError::malformed_hunk_header(header);
    let rest = header.strip_prefix("@@ -").ok_or_else(malformed)?;
    let (ranges, tail) = rest.split_once(" @@").ok_or_else(malformed)?;
    let (old, new) = ranges.split_once(" +").ok_or_else(malformed)?;
    let old = shift_range(old, offset).ok_or_else(malformed)?;
    let new = shift_range(new, offset).ok_or_else(malformed)?;
    Ok(format!("@@ -{} +{} @@{}", old, new, tail))
}

/// Split differ output into its first section header and the remaining body,
/// re-basing every section header by `offset`.
pub fn rebase_sections(diff: &str, offset: usize) -> Result<(String, String)> {
    let mut header = String::new();
    let mut body = String::new();
    for line in diff.split_inclusive('\n') {
        if line.starts_with("@@") {
            let (text, newline) = match line.strip_suffix('\n') {
                Some(text) => (text, "\n"),
                None => (line, ""),
            };
            let rebased = adjust_hunk_offset(text, offset)?;
            if header.is_empty() && body.is_empty() {
                header = format!("{}{}", rebased, newline);
            } else {
                body.push_str(&rebased);
                body.push_str(newline);
            }
        } else {
            body.push_str(line);
        }
    }
    Ok((header, body))
}
