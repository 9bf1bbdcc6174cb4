pub mod email;
pub mod sms;
pub mod webhook;

/// Upper bound for remote response bodies captured into error messages.
pub(crate) const MAX_CAPTURED_BODY: usize = 1000;

/// Truncates a response body for inclusion in an error message.
pub(crate) fn truncate_body(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let mut end = max_len;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &s[..end])
    }
}
