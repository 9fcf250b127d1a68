//! Result types: per-student outcomes, job statistics, and the final
//! archive.

use crate::error::{EntityError, GenerationError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Outcome for one student.
///
/// Exactly one of `document`/`error` is populated. Results are reported in
/// roster order and there is one per student in the job —
/// `len(results) == len(job.students)` always holds, including under
/// cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityResult {
    /// Roll number, GR number, or store id — whatever identified the
    /// student best.
    pub entity_id: String,
    /// Archive entry name, present on success.
    pub entry_name: Option<String>,
    /// Encoded document bytes. Not serialised; the archive carries them.
    #[serde(skip)]
    pub document: Option<Vec<u8>>,
    /// Size of the generated document, kept for JSON reporting.
    pub document_bytes: usize,
    pub duration_ms: u64,
    pub error: Option<EntityError>,
}

impl EntityResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate figures for one finished job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    pub total_entities: usize,
    pub generated: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Wall-clock spent in the concurrent asset-fetch phase.
    pub fetch_duration_ms: u64,
    /// Wall-clock spent laying out documents and writing the archive.
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The finished artifact: archive bytes, per-student results, and stats.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutput {
    /// ZIP container holding one entry per successful student. Not
    /// serialised in JSON reports.
    #[serde(skip)]
    pub archive: Vec<u8>,
    /// Suggested download file name (e.g. `student_cards.zip`).
    pub archive_name: String,
    pub results: Vec<EntityResult>,
    pub stats: JobStats,
}

impl JobOutput {
    /// The failures, in roster order.
    pub fn failures(&self) -> impl Iterator<Item = &EntityError> {
        self.results.iter().filter_map(|r| r.error.as_ref())
    }

    /// Write the archive to disk atomically (temp file + rename) so a
    /// crash never leaves a partial ZIP behind.
    pub async fn write_archive(&self, path: impl AsRef<Path>) -> Result<(), GenerationError> {
        let path = path.as_ref();
        let failed = |source: std::io::Error| GenerationError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(failed)?;
        }
        let tmp_path = path.with_extension("zip.tmp");
        tokio::fs::write(&tmp_path, &self.archive)
            .await
            .map_err(failed)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(failed)?;
        Ok(())
    }

    /// Caller-facing one-liner: `18 of 20 generated; 2 failed: 14, 19`.
    pub fn summary(&self) -> String {
        if self.stats.failed == 0 && self.stats.cancelled == 0 {
            format!(
                "{} of {} generated",
                self.stats.generated, self.stats.total_entities
            )
        } else {
            let failed_ids: Vec<&str> = self.failures().map(|e| e.entity()).collect();
            format!(
                "{} of {} generated; {} failed: {}",
                self.stats.generated,
                self.stats.total_entities,
                failed_ids.len(),
                failed_ids.join(", ")
            )
        }
    }
}
