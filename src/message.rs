//! Plain text message composition

/// Builds a single part, UTF-8, plain text message
///
/// Headers come in a fixed order and are separated by CRLF, followed by one
/// blank line and `body` unchanged plus a final CRLF. Header values are not
/// folded or escaped, callers pass trusted values.
///
/// ```
/// use smtp_notify::message::build_message;
///
/// let message = build_message("a@example.com", "b@example.com", "Hi", "Hello");
/// assert!(message.ends_with("\r\n\r\nHello\r\n"));
/// ```
pub fn build_message(from: &str, to: &str, subject: &str, body: &str) -> String {
    let mut message = String::with_capacity(
        from.len() + to.len() + subject.len() + body.len() + HEADER_OVERHEAD,
    );
    for (name, value) in [
        ("From", from),
        ("To", to),
        ("Subject", subject),
        ("MIME-Version", "1.0"),
        ("Content-Type", "text/plain; charset=\"utf-8\""),
    ] {
        message.push_str(name);
        message.push_str(": ");
        message.push_str(value);
        message.push_str("\r\n");
    }
    message.push_str("\r\n");
    message.push_str(body);
    message.push_str("\r\n");
    message
}

const HEADER_OVERHEAD: usize = 96;
