//! Error types for the cardpress library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`GenerationError`] — **Fatal**: the job cannot proceed or produced
//!   nothing at all (empty batch, unreadable roster, every entity failed).
//!   Returned as `Err(GenerationError)` from the top-level `run_*` functions.
//!
//! * [`EntityError`] — **Non-fatal**: a single student's document failed
//!   (missing identity fields, unusable template asset) but all other
//!   students are fine. Stored inside [`crate::output::EntityResult`] so
//!   callers can inspect partial success rather than losing the whole batch
//!   to one bad record.
//!
//! The separation makes the fail-soft contract structural: a missing photo
//! never even reaches these types (the fetcher returns `None`), a bad
//! student becomes an `EntityError`, and only the "nothing to export" class
//! surfaces to the caller as `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the cardpress library.
///
/// Per-student failures use [`EntityError`] and are stored in
/// [`crate::output::EntityResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum GenerationError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The job was started with an empty student list.
    #[error("No students selected — nothing to generate")]
    NoEntities,

    /// Roster file was not found at the given path.
    #[error("Roster file not found: '{path}'\nCheck the path exists and is readable.")]
    RosterNotFound { path: PathBuf },

    /// Roster file exists but is not valid JSON for a student list.
    #[error("Failed to parse roster '{path}': {detail}")]
    RosterParse { path: PathBuf, detail: String },

    // ── Job errors ────────────────────────────────────────────────────────
    /// Every student in the batch failed; an archive would be empty.
    #[error("No documents generated: all {total} students failed.\nFirst error: {first_error}")]
    AllEntitiesFailed { total: usize, first_error: String },

    /// The archive container could not be serialised.
    #[error("Failed to write archive: {0}")]
    ArchiveWrite(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A non-fatal error for a single student's document.
///
/// Stored alongside [`crate::output::EntityResult`] when a student fails.
/// The overall job continues unless ALL students fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum EntityError {
    /// A required identity field is empty; the document cannot be laid out
    /// or named.
    #[error("Student '{entity}': required field '{field}' is missing")]
    MissingField { entity: String, field: String },

    /// A template-level asset (background raster) could not be loaded, so
    /// the page itself cannot be constructed.
    #[error("Student '{entity}': template asset unusable: {detail}")]
    TemplateAsset { entity: String, detail: String },

    /// Document assembly failed after layout started.
    #[error("Student '{entity}': render failed: {detail}")]
    RenderFailed { entity: String, detail: String },

    /// The job was cancelled before this student was processed.
    #[error("Student '{entity}': skipped, job cancelled")]
    Cancelled { entity: String },
}

impl EntityError {
    /// The identifier of the student this error belongs to.
    pub fn entity(&self) -> &str {
        match self {
            EntityError::MissingField { entity, .. }
            | EntityError::TemplateAsset { entity, .. }
            | EntityError::RenderFailed { entity, .. }
            | EntityError::Cancelled { entity } => entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_entities_failed_display() {
        let e = GenerationError::AllEntitiesFailed {
            total: 20,
            first_error: "template asset unusable".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("20"), "got: {msg}");
        assert!(msg.contains("template asset unusable"));
    }

    #[test]
    fn no_entities_display() {
        let msg = GenerationError::NoEntities.to_string();
        assert!(msg.contains("nothing to generate"));
    }

    #[test]
    fn entity_error_carries_identifier() {
        let e = EntityError::MissingField {
            entity: "roll-14".into(),
            field: "full_name".into(),
        };
        assert_eq!(e.entity(), "roll-14");
        assert!(e.to_string().contains("full_name"));

        let e = EntityError::Cancelled {
            entity: "gr-1021".into(),
        };
        assert_eq!(e.entity(), "gr-1021");
    }

    #[test]
    fn entity_error_round_trips_through_json() {
        let e = EntityError::RenderFailed {
            entity: "12_A".into(),
            detail: "page construction".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: EntityError = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entity(), "12_A");
    }
}
