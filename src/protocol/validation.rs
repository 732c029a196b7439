use crate::config::ProtocolConfig;

use super::error_codes::ErrorKind;

/// Validate and canonicalize chat content: trimmed, 1..=max characters.
/// Returns the trimmed string so callers store exactly what was validated.
pub fn validate_chat_content(content: &str, config: &ProtocolConfig) -> Result<String, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("Chat message cannot be empty".to_string());
    }
    if trimmed.chars().count() > config.max_chat_length {
        return Err(format!(
            "Chat message too long (max {} characters)",
            config.max_chat_length
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_display_name(name: &str, config: &ProtocolConfig) -> Result<(), String> {
    if name.is_empty() {
        return Err("Display name cannot be empty".to_string());
    }
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Display name cannot be blank".to_string());
    }
    if trimmed.len() != name.len() {
        return Err("Display name cannot have leading or trailing whitespace".to_string());
    }
    if name.chars().count() > config.max_display_name_length {
        return Err(format!(
            "Display name too long (max {} characters)",
            config.max_display_name_length
        ));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err("Display name contains control characters".to_string());
    }
    Ok(())
}

pub fn validate_user_id(user_id: &str) -> Result<(), String> {
    if user_id.trim().is_empty() {
        return Err("User id cannot be empty".to_string());
    }
    if user_id.len() > 128 {
        return Err("User id too long".to_string());
    }
    Ok(())
}

/// Parse one inbound text frame into a typed command.
///
/// Oversized or schema-invalid frames yield `ErrorKind::Malformed` with a
/// reason; they never mutate state and never close the connection.
pub fn parse_command<T: serde::de::DeserializeOwned>(
    text: &str,
    config: &ProtocolConfig,
) -> Result<T, (ErrorKind, String)> {
    if text.len() > config.max_message_size {
        return Err((
            ErrorKind::Malformed,
            format!(
                "Message of {} bytes exceeds the {} byte limit",
                text.len(),
                config.max_message_size
            ),
        ));
    }
    serde_json::from_str(text).map_err(|e| (ErrorKind::Malformed, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::lobby::LobbyCommand;

    #[test]
    fn chat_content_is_trimmed() {
        let config = ProtocolConfig::default();
        assert_eq!(
            validate_chat_content("  hello  ", &config).unwrap(),
            "hello"
        );
    }

    #[test]
    fn chat_content_rejects_whitespace_only() {
        let config = ProtocolConfig::default();
        assert!(validate_chat_content("   \t \n ", &config).is_err());
    }

    #[test]
    fn chat_content_enforces_length_after_trim() {
        let config = ProtocolConfig::default();
        let long = "x".repeat(config.max_chat_length);
        assert!(validate_chat_content(&long, &config).is_ok());
        let too_long = "x".repeat(config.max_chat_length + 1);
        assert!(validate_chat_content(&too_long, &config).is_err());
    }

    #[test]
    fn display_name_rejects_padding() {
        let config = ProtocolConfig::default();
        assert!(validate_display_name("Astrid", &config).is_ok());
        assert!(validate_display_name(" Astrid", &config).is_err());
        assert!(validate_display_name("", &config).is_err());
    }

    #[test]
    fn parse_command_rejects_oversized_frames() {
        let config = ProtocolConfig {
            max_message_size: 16,
            ..ProtocolConfig::default()
        };
        let result: Result<LobbyCommand, _> =
            parse_command(r#"{"type":"GET_ROOMS","payload":null}"#, &config);
        let (kind, _) = result.unwrap_err();
        assert_eq!(kind, ErrorKind::Malformed);
    }

    #[test]
    fn parse_command_surfaces_schema_errors() {
        let config = ProtocolConfig::default();
        let result: Result<LobbyCommand, _> = parse_command(r#"{"type":"NOT_A_CMD"}"#, &config);
        assert!(result.is_err());
    }
}
