//! Eager (full-batch) generation entry points.
//!
//! ## Phases
//!
//! [`run_job`] executes one batch in three phases:
//!
//! 1. **Fetch (concurrent)** — each student's network assets (photo,
//!    barcode render) are resolved through a bounded worker pool. Fetching
//!    is the dominant latency source; everything else is CPU-bound.
//! 2. **Layout (sequential)** — documents are rendered in roster order.
//!    Any per-student failure is captured as an [`EntityError`] and the
//!    loop continues; **no partial result ever discards already-completed
//!    work**.
//! 3. **Package** — successes are inserted into the exclusively-owned ZIP
//!    writer as they render, preserving roster order in the archive listing
//!    for reproducibility.
//!
//! A job ends in one of three states: every student generated, some
//! generated (archive + failure list), or none generated — only the last is
//! an `Err`, because an empty archive helps nobody.

use crate::config::GenerationConfig;
use crate::error::{EntityError, GenerationError};
use crate::model::{CardSide, DocumentKind, GenerationJob, JobParams, StudentRecord};
use crate::output::{EntityResult, JobOutput, JobStats};
use crate::pipeline::{archive::ArchiveBuilder, fetch::AssetFetcher, layout};
use crate::template::{builtin, DocumentTemplate};
use futures::stream::{self, StreamExt};
use std::time::Instant;
use tracing::{debug, info, warn};

/// The templates a job renders, in page order. For two-sided cards the
/// front always precedes the back.
pub fn templates_for(kind: DocumentKind, side: CardSide, school: &str) -> Vec<DocumentTemplate> {
    match kind {
        DocumentKind::IdCard => match side {
            CardSide::Front => vec![builtin::card_front()],
            CardSide::Back => vec![builtin::card_back()],
            CardSide::Both => vec![builtin::card_front(), builtin::card_back()],
        },
        DocumentKind::AdmissionForm => vec![builtin::admission_form(school)],
        DocumentKind::Marksheet => vec![builtin::marksheet(school)],
    }
}

/// Generate documents for every student in the job and package the
/// successes into a ZIP archive.
///
/// # Returns
/// `Ok(JobOutput)` whenever at least one document was generated — check
/// `output.stats.failed` and `output.failures()` for partial outcomes.
///
/// # Errors
/// Returns `Err(GenerationError)` only for the job-failure class:
/// - Empty student list
/// - Zero successes across the whole batch
/// - Archive serialisation failure
pub async fn run_job(
    job: &GenerationJob,
    config: &GenerationConfig,
) -> Result<JobOutput, GenerationError> {
    let total_start = Instant::now();
    let total = job.students.len();
    info!(
        "Starting {:?} job for {} students",
        job.kind, total
    );

    if job.students.is_empty() {
        return Err(GenerationError::NoEntities);
    }

    let templates = job
        .templates
        .clone()
        .unwrap_or_else(|| templates_for(job.kind, job.side, &job.params.school));

    if let Some(ref cb) = config.progress_callback {
        cb.on_job_start(total);
    }

    // ── Phase 1: template assets + concurrent per-student fetches ────────
    let assets = layout::TemplateAssets::load(&templates, &config.asset_dir);
    let fetcher = AssetFetcher::new(config);

    let fetch_start = Instant::now();
    let mut fetched: Vec<(usize, layout::FetchedAssets)> =
        stream::iter(job.students.iter().enumerate().map(|(i, student)| {
            let fetcher = fetcher.clone();
            let templates = &templates;
            let params = &job.params;
            async move {
                if config.is_cancelled() {
                    return (i, layout::FetchedAssets::default());
                }
                let assets = layout::fetch_for_student(
                    &fetcher,
                    templates,
                    student,
                    params,
                    config.quality_scale,
                )
                .await;
                (i, assets)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    // The pool completes out of order; restore roster order before layout.
    fetched.sort_by_key(|(i, _)| *i);
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
    debug!("Fetched assets for {} students in {}ms", total, fetch_duration_ms);

    // ── Phase 2 + 3: sequential layout and archive insertion ─────────────
    let render_start = Instant::now();
    let mut builder = ArchiveBuilder::new();
    let mut results: Vec<EntityResult> = Vec::with_capacity(total);
    let mut cancelled = 0usize;

    for ((i, student), (_, student_assets)) in
        job.students.iter().enumerate().zip(fetched.into_iter())
    {
        let entity_id = student.display_id().to_string();
        let entity_start = Instant::now();

        if let Some(ref cb) = config.progress_callback {
            cb.on_entity_start(i, total, &entity_id);
        }

        if config.is_cancelled() {
            cancelled += 1;
            let error = EntityError::Cancelled {
                entity: entity_id.clone(),
            };
            if let Some(ref cb) = config.progress_callback {
                cb.on_entity_error(i, total, &entity_id, &error.to_string());
            }
            results.push(failure_result(entity_id, error, entity_start));
            continue;
        }

        match layout::render_document(
            student,
            &templates,
            &assets,
            &student_assets,
            &job.params,
            config,
        ) {
            Ok(bytes) => {
                let name = builder.entry_name(student.archive_stem(), job.kind.entry_suffix());
                builder.insert(&name, &bytes)?;
                if let Some(ref cb) = config.progress_callback {
                    cb.on_entity_complete(i, total, &entity_id, bytes.len());
                }
                results.push(EntityResult {
                    entity_id,
                    entry_name: Some(name),
                    document_bytes: bytes.len(),
                    document: Some(bytes),
                    duration_ms: entity_start.elapsed().as_millis() as u64,
                    error: None,
                });
            }
            Err(error) => {
                warn!("Student {} failed: {}", entity_id, error);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_entity_error(i, total, &entity_id, &error.to_string());
                }
                results.push(failure_result(entity_id, error, entity_start));
            }
        }
    }
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    // ── Terminal state ───────────────────────────────────────────────────
    let generated = results.iter().filter(|r| r.is_success()).count();
    if generated == 0 {
        let first_error = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(GenerationError::AllEntitiesFailed { total, first_error });
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_job_complete(total, generated);
    }

    let archive = builder.finish()?;
    let failed = total - generated - cancelled;
    let stats = JobStats {
        total_entities: total,
        generated,
        failed,
        cancelled,
        fetch_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Job complete: {}/{} documents, {}ms total",
        generated, total, stats.total_duration_ms
    );

    Ok(JobOutput {
        archive,
        archive_name: job.kind.archive_name().to_string(),
        results,
        stats,
    })
}

/// Generate one student's document and return its bytes directly — the
/// N = 1 path needs no archive wrapping.
pub async fn run_single(
    student: &StudentRecord,
    kind: DocumentKind,
    side: CardSide,
    params: &JobParams,
    config: &GenerationConfig,
) -> Result<Vec<u8>, GenerationError> {
    let templates = templates_for(kind, side, &params.school);
    let assets = layout::TemplateAssets::load(&templates, &config.asset_dir);
    let fetcher = AssetFetcher::new(config);
    let fetched =
        layout::fetch_for_student(&fetcher, &templates, student, params, config.quality_scale)
            .await;

    layout::render_document(student, &templates, &assets, &fetched, params, config).map_err(
        |error| GenerationError::AllEntitiesFailed {
            total: 1,
            first_error: error.to_string(),
        },
    )
}

fn failure_result(entity_id: String, error: EntityError, started: Instant) -> EntityResult {
    EntityResult {
        entity_id,
        entry_name: None,
        document: None,
        document_bytes: 0,
        duration_ms: started.elapsed().as_millis() as u64,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_always_precedes_back() {
        let templates = templates_for(DocumentKind::IdCard, CardSide::Both, "Test");
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].name, "card_front");
        assert_eq!(templates[1].name, "card_back");
    }

    #[test]
    fn single_sided_kinds_render_one_page() {
        assert_eq!(
            templates_for(DocumentKind::Marksheet, CardSide::Both, "Test").len(),
            1
        );
        assert_eq!(
            templates_for(DocumentKind::AdmissionForm, CardSide::Front, "Test").len(),
            1
        );
    }

    #[tokio::test]
    async fn empty_batch_is_a_job_error() {
        let job = GenerationJob::new(vec![], DocumentKind::IdCard);
        let err = run_job(&job, &GenerationConfig::default()).await.unwrap_err();
        assert!(matches!(err, GenerationError::NoEntities));
    }
}
