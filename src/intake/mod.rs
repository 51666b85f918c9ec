//! File intake: ownership of the selected register image and its
//! transient preview handle.
//!
//! The intake manager is the single owner of the source file. Browse
//! selection and drag-and-drop both arrive as a [`FileCandidate`] and
//! funnel through the same validation and handle-replacement path. At
//! most one preview handle is live per manager; it is revoked on every
//! path that retires a source file — replacement, explicit clear, and
//! teardown — never only on the happy path.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use tracing::debug;
use uuid::Uuid;

use crate::errors::ValidationError;

/// An unvalidated file offered for selection, from either browse or
/// drag-and-drop.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    /// Media-type tag if the source supplied one; otherwise guessed from
    /// the file name during validation.
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileCandidate {
    /// Read a candidate from disk, guessing the media type from the
    /// extension. CLI entry point for selection.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let media_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().to_string());
        Ok(Self {
            name,
            media_type,
            bytes,
        })
    }
}

/// The validated source file, owned exclusively by the intake manager.
#[derive(Debug, Clone)]
pub struct SourceFile {
    id: Uuid,
    name: String,
    media_type: String,
    bytes: Arc<[u8]>,
}

impl SourceFile {
    /// Identity used to tag async calls so stale resolutions can be
    /// recognized and discarded.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Cheap shared handle to the payload for the extraction request.
    pub fn share_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}

/// Transient, revocable reference derived 1:1 from the source file.
///
/// Revocation is explicit on every retiring path; `Drop` is only a
/// backstop so a handle that escapes those paths still releases its slot
/// in the live count.
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    revoked: bool,
    live: Arc<AtomicUsize>,
}

impl PreviewHandle {
    fn issue(source_id: Uuid, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::Relaxed);
        Self {
            id: source_id,
            revoked: false,
            live,
        }
    }

    /// The source file this preview was derived from.
    pub fn source_id(&self) -> Uuid {
        self.id
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    pub fn revoke(&mut self) {
        if !self.revoked {
            self.revoked = true;
            self.live.fetch_sub(1, Ordering::Relaxed);
            debug!(source_id = %self.id, "preview handle revoked");
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.revoke();
    }
}

/// Owns the selected source file and its preview handle.
#[derive(Debug)]
pub struct IntakeManager {
    source: Option<SourceFile>,
    preview: Option<PreviewHandle>,
    live_previews: Arc<AtomicUsize>,
}

impl IntakeManager {
    pub fn new() -> Self {
        Self {
            source: None,
            preview: None,
            live_previews: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Validate and take ownership of a candidate. On success the prior
    /// preview handle is revoked and the handle pair replaced; on failure
    /// prior state is left untouched — no partial replacement.
    pub fn select(&mut self, candidate: FileCandidate) -> Result<&SourceFile, ValidationError> {
        let media_type = resolve_media_type(&candidate)?;
        if candidate.bytes.is_empty() {
            return Err(ValidationError::EmptyPayload {
                name: candidate.name,
            });
        }

        self.revoke_preview();
        let id = Uuid::new_v4();
        self.preview = Some(PreviewHandle::issue(id, Arc::clone(&self.live_previews)));
        let source = SourceFile {
            id,
            name: candidate.name,
            media_type,
            bytes: candidate.bytes.into(),
        };
        debug!(source_id = %id, name = %source.name, size = source.size_bytes(), "file selected");
        Ok(self.source.insert(source))
    }

    /// Revoke the preview and discard the source file.
    pub fn clear(&mut self) {
        self.revoke_preview();
        self.source = None;
    }

    pub fn source(&self) -> Option<&SourceFile> {
        self.source.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    /// Number of un-revoked preview handles issued by this manager.
    /// Stays at most 1; reaching 0 after clear/teardown means no leak.
    pub fn live_preview_count(&self) -> usize {
        self.live_previews.load(Ordering::Relaxed)
    }

    fn revoke_preview(&mut self) {
        if let Some(mut preview) = self.preview.take() {
            preview.revoke();
        }
    }
}

impl Default for IntakeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntakeManager {
    fn drop(&mut self) {
        // Teardown retires the source file like any other path.
        self.revoke_preview();
    }
}

fn resolve_media_type(candidate: &FileCandidate) -> Result<String, ValidationError> {
    let tag = candidate.media_type.clone().or_else(|| {
        mime_guess::from_path(&candidate.name)
            .first()
            .map(|m| m.essence_str().to_string())
    });
    match tag {
        Some(t) if t.starts_with("image/") => Ok(t),
        Some(t) => Err(ValidationError::IncompatibleMediaType { media_type: t }),
        None => Err(ValidationError::IncompatibleMediaType {
            media_type: "unknown".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg(name: &str) -> FileCandidate {
        FileCandidate {
            name: name.to_string(),
            media_type: Some("image/jpeg".to_string()),
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
        }
    }

    #[test]
    fn select_accepts_image_and_issues_preview() {
        let mut intake = IntakeManager::new();
        let id = intake.select(jpeg("register.jpg")).unwrap().id();
        assert_eq!(intake.source().unwrap().id(), id);
        assert_eq!(intake.preview().unwrap().source_id(), id);
        assert_eq!(intake.live_preview_count(), 1);
    }

    #[test]
    fn select_rejects_non_image_without_touching_state() {
        let mut intake = IntakeManager::new();
        let first = intake.select(jpeg("register.jpg")).unwrap().id();

        let bad = FileCandidate {
            name: "notes.pdf".to_string(),
            media_type: Some("application/pdf".to_string()),
            bytes: vec![1, 2, 3],
        };
        let err = intake.select(bad).unwrap_err();
        assert!(matches!(err, ValidationError::IncompatibleMediaType { .. }));

        // Prior selection is intact, including its preview
        assert_eq!(intake.source().unwrap().id(), first);
        assert_eq!(intake.live_preview_count(), 1);
    }

    #[test]
    fn select_guesses_media_type_from_name() {
        let mut intake = IntakeManager::new();
        let candidate = FileCandidate {
            name: "register.png".to_string(),
            media_type: None,
            bytes: vec![0x89, 0x50],
        };
        let source = intake.select(candidate).unwrap();
        assert_eq!(source.media_type(), "image/png");
    }

    #[test]
    fn select_rejects_empty_payload() {
        let mut intake = IntakeManager::new();
        let candidate = FileCandidate {
            name: "register.jpg".to_string(),
            media_type: Some("image/jpeg".to_string()),
            bytes: Vec::new(),
        };
        assert!(matches!(
            intake.select(candidate),
            Err(ValidationError::EmptyPayload { .. })
        ));
        assert!(intake.source().is_none());
    }

    #[test]
    fn replacement_revokes_prior_preview() {
        let mut intake = IntakeManager::new();
        intake.select(jpeg("one.jpg")).unwrap();
        intake.select(jpeg("two.jpg")).unwrap();
        // Exactly one live handle: the new one
        assert_eq!(intake.live_preview_count(), 1);
        assert_eq!(intake.source().unwrap().name(), "two.jpg");
    }

    #[test]
    fn repeated_selections_never_accumulate_previews() {
        let mut intake = IntakeManager::new();
        for i in 0..50 {
            intake.select(jpeg(&format!("{i}.jpg"))).unwrap();
        }
        assert_eq!(intake.live_preview_count(), 1);
    }

    #[test]
    fn clear_revokes_and_discards() {
        let mut intake = IntakeManager::new();
        intake.select(jpeg("one.jpg")).unwrap();
        intake.clear();
        assert!(intake.source().is_none());
        assert!(intake.preview().is_none());
        assert_eq!(intake.live_preview_count(), 0);
    }

    #[test]
    fn teardown_revokes_preview() {
        let mut intake = IntakeManager::new();
        intake.select(jpeg("one.jpg")).unwrap();
        let live = Arc::clone(&intake.live_previews);
        drop(intake);
        assert_eq!(live.load(Ordering::Relaxed), 0);
    }
}
