//! Selection-time validation of attachment batches.

use glance_shared::constants::MAX_ATTACHMENTS_PER_MESSAGE;
use glance_shared::{AttachmentType, SelectedFile};

use crate::kind;

#[derive(Debug, Clone)]
pub struct ValidatedFile {
    pub file: SelectedFile,
    pub kind: AttachmentType,
}

/// Result of validating one multi-file selection. `error` holds the last
/// user-facing rejection, if any; `accepted` holds everything that passed.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub accepted: Vec<ValidatedFile>,
    pub error: Option<String>,
}

/// Validate a selection batch against the draft-count ceiling and per-file
/// type/size rules.
///
/// The count ceiling is fail-fast: once exceeded, the entire remaining batch
/// is dropped behind one error message. Type and size rejections skip only
/// the offending file.
pub fn validate_selection(existing_count: usize, files: Vec<SelectedFile>) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for file in files {
        if existing_count + outcome.accepted.len() >= MAX_ATTACHMENTS_PER_MESSAGE {
            outcome.error = Some(format!(
                "You can attach at most {MAX_ATTACHMENTS_PER_MESSAGE} files per message."
            ));
            break;
        }

        let Some(kind) = kind::resolve_type(file.mime_type.as_deref(), &file.file_name) else {
            outcome.error = Some(format!("{} is not a supported type.", file.file_name));
            continue;
        };

        let size = file.data.len() as u64;
        if size > kind::max_bytes(kind) {
            outcome.error = Some(format!(
                "{} is too large, max size is {}.",
                file.file_name,
                kind::size_limit_label(kind)
            ));
            continue;
        }

        outcome.accepted.push(ValidatedFile { file, kind });
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn file(name: &str, mime: Option<&str>, size: usize) -> SelectedFile {
        SelectedFile {
            file_name: name.to_string(),
            mime_type: mime.map(str::to_string),
            data: Bytes::from(vec![0u8; size]),
        }
    }

    #[test]
    fn accepts_a_clean_batch() {
        let outcome = validate_selection(
            0,
            vec![
                file("a.jpg", Some("image/jpeg"), 100),
                file("b.pdf", Some("application/pdf"), 100),
            ],
        );
        assert_eq!(outcome.accepted.len(), 2);
        assert!(outcome.error.is_none());
    }

    #[test]
    fn count_ceiling_aborts_the_remaining_batch() {
        let files: Vec<_> = (0..4)
            .map(|i| file(&format!("f{i}.jpg"), Some("image/jpeg"), 10))
            .collect();
        let outcome = validate_selection(4, files);
        // 4 existing drafts leave room for 2; the 3rd hits the ceiling and
        // the 4th is never considered.
        assert_eq!(outcome.accepted.len(), 2);
        assert_eq!(
            outcome.error.as_deref(),
            Some("You can attach at most 6 files per message.")
        );
    }

    #[test]
    fn unsupported_type_skips_only_that_file() {
        let outcome = validate_selection(
            0,
            vec![
                file("tool.exe", None, 10),
                file("ok.png", Some("image/png"), 10),
            ],
        );
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(
            outcome.error.as_deref(),
            Some("tool.exe is not a supported type.")
        );
    }

    #[test]
    fn oversize_file_is_rejected_with_its_cap() {
        let outcome = validate_selection(
            0,
            vec![file("big.jpg", Some("image/jpeg"), 11 * 1024 * 1024)],
        );
        assert!(outcome.accepted.is_empty());
        assert_eq!(
            outcome.error.as_deref(),
            Some("big.jpg is too large, max size is 10 MB.")
        );
    }
}
