/// Locates the JSON object in a model reply. Models tend to wrap JSON in a
/// ```` ```json ```` fence or surround it with prose.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // Skip the info string (e.g. "json") up to the end of the fence line.
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            let candidate = body[..end].trim();
            if candidate.starts_with('{') {
                return Some(candidate);
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&trimmed[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_object() {
        assert_eq!(extract_json_object(r#" {"a": 1} "#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn test_fenced_object() {
        let reply = "Here you go:\n```json\n{\"a\": {\"b\": 2}}\n```\nEnjoy.";
        assert_eq!(extract_json_object(reply), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn test_object_inside_prose() {
        let reply = "Sure! {\"a\": \"x\"} Let me know if you need more.";
        assert_eq!(extract_json_object(reply), Some("{\"a\": \"x\"}"));
    }

    #[test]
    fn test_no_object() {
        assert_eq!(extract_json_object("I cannot help with that."), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
