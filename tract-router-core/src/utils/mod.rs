//! Utility functions and helpers

/// Render a payload for log lines: UTF-8 text when printable, otherwise a
/// hex preview. Output is capped at `max_len` bytes plus an ellipsis.
pub fn preview_payload(payload: &[u8], max_len: usize) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => truncate(text, max_len),
        _ => {
            let shown = payload.len().min(max_len / 2);
            let mut hex: String = payload[..shown]
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect();
            if shown < payload.len() {
                hex.push_str("...");
            }
            hex
        }
    }
}

/// Truncate a string to a maximum byte length, ensuring valid UTF-8 boundaries
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len.saturating_sub(3);
        while !s.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        format!("{}...", &s[..end])
    }
}
