//! Shared helpers: binary sniffing, text decoding, paths, tokens, digests.

pub mod encoding;
pub mod hashing;
pub mod paths;
pub mod tokens;

pub use encoding::{is_binary_file, read_file_safe, sniff_binary, DecodedText};
pub use hashing::content_digest;
pub use paths::{relative_slash_path, repo_name_from_url};
pub use tokens::{estimate_tokens, format_token_count};

/// Format a number with thousands separators (`1234567` -> `1,234,567`).
pub fn format_with_commas(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
