//! Conversation preview derivation.

use glance_shared::constants::PREVIEW_LIMIT;
use glance_shared::{AttachmentType, Message, MessageAttachment};

/// Build the sidebar preview line for a message.
///
/// Content wins when present: whitespace is collapsed and the result is
/// truncated at the preview limit with an ellipsis. Without content the
/// preview is derived from the attachments; without either it is empty.
pub fn build_preview(message: &Message) -> String {
    let content = message.content.as_deref().unwrap_or("");
    let normalized = normalize_whitespace(content);
    if !normalized.is_empty() {
        return truncate(&normalized);
    }
    match message.attachments.as_deref() {
        Some(attachments) if !attachments.is_empty() => attachment_preview(attachments),
        _ => String::new(),
    }
}

fn normalize_whitespace(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(normalized: &str) -> String {
    if normalized.chars().count() <= PREVIEW_LIMIT {
        return normalized.to_string();
    }
    let clipped: String = normalized.chars().take(PREVIEW_LIMIT).collect();
    format!("{}...", clipped.trim())
}

fn attachment_preview(attachments: &[MessageAttachment]) -> String {
    if attachments.len() > 1 {
        return format!("{} attachments", attachments.len());
    }
    match attachments[0].attachment_type {
        AttachmentType::Image => "Photo".to_string(),
        AttachmentType::Video => "Video".to_string(),
        AttachmentType::Document => "Document".to_string(),
    }
}
