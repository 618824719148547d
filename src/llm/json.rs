//! Locating JSON in free-form model output

use serde::de::DeserializeOwned;

/// Return the JSON object embedded in `text`.
///
/// A fenced block (```` ```json ```` or bare ```` ``` ````) opened before the
/// first `{` wins over surrounding prose; inside it, or in the raw text, the
/// object spans the first `{` to the last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let first_brace = text.find('{')?;
    if let Some((fence_start, inner)) = fenced_block(text) {
        if fence_start < first_brace {
            if let Some(object) = object_span(inner) {
                return Some(object);
            }
        }
    }
    object_span(text)
}

fn object_span(body: &str) -> Option<&str> {
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

fn fenced_block(text: &str) -> Option<(usize, &str)> {
    let open = text.find("```")?;
    let after_fence = &text[open + 3..];
    // Skip the info string (`json`, `JSON`, ...) up to the end of the line.
    let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after_fence[content_start..];
    let close = content.find("```")?;
    Some((open, &content[..close]))
}

/// Deserialize the embedded JSON object, describing failures as text.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let json = extract_json_object(text).ok_or_else(|| "no JSON object in response".to_string())?;
    serde_json::from_str(json).map_err(|e| format!("invalid JSON: {e}"))
}
