//! Composer validation.
//!
//! Ordered, pre-network checks; each failure maps to one user-facing string
//! and aborts before anything touches the wire.

use glance_shared::constants::MAX_MESSAGE_LENGTH;

pub const ERR_RECIPIENT_REQUIRED: &str = "Recipient username is required.";
pub const ERR_CONTENT_OR_ATTACHMENT_REQUIRED: &str = "Message content or attachment is required.";

pub fn length_error() -> String {
    format!("Message must be under {MAX_MESSAGE_LENGTH} characters.")
}

/// Validate a composed message. `recipient` and `content` arrive trimmed.
pub fn validate(recipient: &str, content: &str, has_attachments: bool) -> Result<(), String> {
    if recipient.is_empty() {
        return Err(ERR_RECIPIENT_REQUIRED.to_string());
    }
    if content.is_empty() && !has_attachments {
        return Err(ERR_CONTENT_OR_ATTACHMENT_REQUIRED.to_string());
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(length_error());
    }
    Ok(())
}

/// Enter sends; shift+Enter inserts a newline.
pub fn should_send_on_enter(key: &str, shift_held: bool) -> bool {
    key == "Enter" && !shift_held
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_is_checked_first() {
        assert_eq!(
            validate("", "hi", false),
            Err(ERR_RECIPIENT_REQUIRED.to_string())
        );
        // Even with nothing else filled in, recipient wins.
        assert_eq!(
            validate("", "", false),
            Err(ERR_RECIPIENT_REQUIRED.to_string())
        );
    }

    #[test]
    fn content_or_attachment_is_required() {
        assert_eq!(
            validate("bob", "", false),
            Err(ERR_CONTENT_OR_ATTACHMENT_REQUIRED.to_string())
        );
        // An attachment alone satisfies the requirement.
        assert_eq!(validate("bob", "", true), Ok(()));
    }

    #[test]
    fn overlong_content_is_rejected() {
        let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        let error = validate("bob", &long, false).unwrap_err();
        assert!(error.starts_with("Message must be under"));

        let exactly = "a".repeat(MAX_MESSAGE_LENGTH);
        assert_eq!(validate("bob", &exactly, false), Ok(()));
    }

    #[test]
    fn enter_discrimination() {
        assert!(should_send_on_enter("Enter", false));
        assert!(!should_send_on_enter("Enter", true));
        assert!(!should_send_on_enter("a", false));
    }
}
