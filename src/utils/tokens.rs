//! Token estimation

/// Estimate tokens using a simple heuristic (chars / 4).
///
/// Counts Unicode code points, not bytes, so CJK text and emoji are not
/// over-counted.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

/// Compact token count: `950`, `12.3k`, `1.2M`.
pub fn format_token_count(tokens: usize) -> String {
    if tokens > 1_000_000 {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    } else if tokens > 1_000 {
        format!("{:.1}k", tokens as f64 / 1_000.0)
    } else {
        tokens.to_string()
    }
}
