use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

use crate::constants::OUTPUT_FILE_PREFIX;

/// Trims a raw cell and maps blanks and spreadsheet null markers to `None`.
pub fn clean_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || is_null_marker(trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn is_null_marker(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "nan" | "none" | "null" | "n/a"
    )
}

/// Strips the `.0` suffix left behind when a numeric identifier was stored as a float.
///
/// `normalize_identifier(normalize_identifier(x)) == normalize_identifier(x)` for every input:
/// a value whose remainder still ends in `.0` is left untouched.
pub fn normalize_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.strip_suffix(".0").map(str::trim_end) {
        Some(rest) if !rest.is_empty() && !rest.ends_with(".0") => rest.to_string(),
        _ => trimmed.to_string(),
    }
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_lowercase()
        .contains(&needle.to_lowercase())
}

/// Removes every case-insensitive occurrence of an ASCII `marker` from `text`.
pub fn remove_ignore_case(text: &str, marker: &str) -> String {
    if marker.is_empty() {
        return text.to_string();
    }
    let lower = text.to_ascii_lowercase();
    let marker = marker.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    while let Some(offset) = lower[cursor..].find(&marker) {
        let start = cursor + offset;
        out.push_str(&text[cursor..start]);
        cursor = start + marker.len();
    }
    out.push_str(&text[cursor..]);
    out
}

pub fn default_output_path(report_path: &Path, now: DateTime<Local>) -> PathBuf {
    let file_name = report_path
        .file_name()
        .and_then(|x| x.to_str())
        .unwrap_or("report.xlsx");
    let stamp = now.format("%Y%m%d_%H%M%S");
    report_path.with_file_name(format!("{OUTPUT_FILE_PREFIX}_{stamp}_{file_name}"))
}
