//! Input validation for ids and outbound message text

/// Maximum message length accepted by the remote service.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Validates a snowflake id (non-empty, ASCII digits only)
pub fn validate_snowflake(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("Id cannot be empty".to_string());
    }

    if !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("Invalid id '{}': expected digits only", id));
    }

    Ok(())
}

/// Validates the text of an outbound message
pub fn validate_message(msg: &str) -> Result<(), String> {
    if msg.trim().is_empty() {
        return Err("Message cannot be empty".to_string());
    }

    let chars = msg.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(format!(
            "Message too long ({} characters, max {})",
            chars, MAX_MESSAGE_CHARS
        ));
    }

    Ok(())
}

/// Sanitizes a message by trimming it and dropping NUL characters
pub fn sanitize_message(msg: &str) -> String {
    msg.trim()
        .chars()
        .filter(|&c| c != '\0')
        .collect()
}
