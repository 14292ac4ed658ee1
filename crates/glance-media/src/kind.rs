//! Attachment kind resolution and per-kind size ceilings.
//!
//! The declared MIME type wins; the file extension is only a fallback for
//! files the platform hands over without one.

use glance_shared::constants::{MAX_DOCUMENT_BYTES, MAX_IMAGE_BYTES, MAX_VIDEO_BYTES};
use glance_shared::AttachmentType;

const DOCUMENT_MIMES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/zip",
    "text/plain",
    "text/csv",
];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "avi", "m4v"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "rtf", "csv", "zip"];

/// Resolve the attachment kind, MIME first, extension second.
pub fn resolve_type(mime_type: Option<&str>, file_name: &str) -> Option<AttachmentType> {
    if let Some(mime) = mime_type.map(str::to_ascii_lowercase).filter(|m| !m.is_empty()) {
        if mime.starts_with("image/") {
            return Some(AttachmentType::Image);
        }
        if mime.starts_with("video/") {
            return Some(AttachmentType::Video);
        }
        if DOCUMENT_MIMES.contains(&mime.as_str())
            || mime.starts_with("application/vnd.openxmlformats-officedocument")
        {
            return Some(AttachmentType::Document);
        }
    }

    let extension = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Some(AttachmentType::Image);
    }
    if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        return Some(AttachmentType::Video);
    }
    if DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
        return Some(AttachmentType::Document);
    }
    None
}

pub fn max_bytes(kind: AttachmentType) -> u64 {
    match kind {
        AttachmentType::Image => MAX_IMAGE_BYTES,
        AttachmentType::Video => MAX_VIDEO_BYTES,
        AttachmentType::Document => MAX_DOCUMENT_BYTES,
    }
}

/// Human-readable size ceiling for error messages.
pub fn size_limit_label(kind: AttachmentType) -> String {
    format!("{} MB", max_bytes(kind) / (1024 * 1024))
}

/// GIFs skip re-encoding so animation survives.
pub fn is_gif(mime_type: Option<&str>, file_name: &str) -> bool {
    if mime_type.is_some_and(|m| m.eq_ignore_ascii_case("image/gif")) {
        return true;
    }
    file_name
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("gif"))
}
