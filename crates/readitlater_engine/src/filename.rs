use std::fmt::Write;

use sha2::{Digest, Sha256};

const MAX_STEM_CHARS: usize = 80;

/// Make a note or directory name safe for common filesystems.
///
/// Illegal characters become `_`, runs of `_` collapse, the stem is capped at
/// 80 characters and Windows device names get a trailing `_`. A short
/// alphanumeric extension such as `.md` is preserved across truncation.
pub fn sanitize_file_name(input: &str) -> String {
    let (stem, extension) = split_extension(input.trim());

    let cleaned: String = stem
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }

    let mut final_name: String = compacted.chars().take(MAX_STEM_CHARS).collect();
    final_name.truncate(final_name.trim_end_matches(&[' ', '.'][..]).len());
    if final_name.is_empty() {
        final_name = "untitled".to_string();
    }
    if is_reserved_windows_name(&final_name) {
        final_name.push('_');
    }
    match extension {
        Some(ext) => format!("{final_name}.{ext}"),
        None => final_name,
    }
}

fn split_extension(input: &str) -> (&str, Option<&str>) {
    match input.rsplit_once('.') {
        Some((stem, ext))
            if !stem.trim().is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, Some(ext))
        }
        _ => (input, None),
    }
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '^' | '[' | ']' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// First `hex_len` hex digits of the SHA-256 of `input`.
pub fn short_hash(input: &str, hex_len: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex.truncate(hex_len.min(hex.len()));
    hex
}
