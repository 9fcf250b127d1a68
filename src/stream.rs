//! Streaming generation API: emit each student's result as it completes.
//!
//! ## Why stream?
//!
//! Large batches take a while — mostly network time fetching photos and
//! barcode renders. A stream-based API lets callers show incremental
//! progress, persist documents one by one, or bound peak memory instead of
//! buffering the whole batch.
//!
//! Unlike the eager [`crate::job::run_job`], which returns only after the
//! archive is sealed, [`run_job_stream`] yields one [`EntityResult`] per
//! student, in roster order, with the document bytes inline and no archive
//! packaging (`entry_name` is `None`). Wrap the successes yourself if you
//! need a container.

use crate::config::GenerationConfig;
use crate::error::{EntityError, GenerationError};
use crate::model::GenerationJob;
use crate::output::EntityResult;
use crate::pipeline::{fetch::AssetFetcher, layout};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-student results.
pub type EntityStream = Pin<Box<dyn Stream<Item = EntityResult> + Send>>;

/// Generate documents for the job's students, yielding results as they are
/// ready. Asset fetching and rendering overlap up to the configured
/// concurrency; emission order is roster order.
///
/// # Returns
/// - `Ok(EntityStream)` — one item per student, failures included
/// - `Err(GenerationError)` — fatal error (empty student list)
pub async fn run_job_stream(
    job: GenerationJob,
    config: GenerationConfig,
) -> Result<EntityStream, GenerationError> {
    info!(
        "Starting streaming {:?} job for {} students",
        job.kind,
        job.students.len()
    );

    if job.students.is_empty() {
        return Err(GenerationError::NoEntities);
    }

    let templates = Arc::new(
        job.templates
            .clone()
            .unwrap_or_else(|| crate::job::templates_for(job.kind, job.side, &job.params.school)),
    );
    let assets = Arc::new(layout::TemplateAssets::load(&templates, &config.asset_dir));
    let fetcher = AssetFetcher::new(&config);
    let params = Arc::new(job.params);
    let concurrency = config.concurrency;
    let config = Arc::new(config);

    let s = stream::iter(job.students.into_iter())
        .map(move |student| {
            let templates = Arc::clone(&templates);
            let assets = Arc::clone(&assets);
            let params = Arc::clone(&params);
            let config = Arc::clone(&config);
            let fetcher = fetcher.clone();
            async move {
                let start = Instant::now();
                let entity_id = student.display_id().to_string();

                if config.is_cancelled() {
                    return EntityResult {
                        entity_id: entity_id.clone(),
                        entry_name: None,
                        document: None,
                        document_bytes: 0,
                        duration_ms: 0,
                        error: Some(EntityError::Cancelled { entity: entity_id }),
                    };
                }

                let fetched = layout::fetch_for_student(
                    &fetcher,
                    &templates,
                    &student,
                    &params,
                    config.quality_scale,
                )
                .await;

                match layout::render_document(
                    &student, &templates, &assets, &fetched, &params, &config,
                ) {
                    Ok(bytes) => EntityResult {
                        entity_id,
                        entry_name: None,
                        document_bytes: bytes.len(),
                        document: Some(bytes),
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: None,
                    },
                    Err(error) => EntityResult {
                        entity_id,
                        entry_name: None,
                        document: None,
                        document_bytes: 0,
                        duration_ms: start.elapsed().as_millis() as u64,
                        error: Some(error),
                    },
                }
            }
        })
        .buffered(concurrency);

    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentKind, StudentRecord};

    #[tokio::test]
    async fn empty_batch_is_rejected_up_front() {
        let job = GenerationJob::new(vec![], DocumentKind::Marksheet);
        let err = run_job_stream(job, GenerationConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GenerationError::NoEntities));
    }

    #[tokio::test]
    async fn stream_preserves_roster_order() {
        let students: Vec<StudentRecord> = (1..=3)
            .map(|i| StudentRecord {
                id: format!("s-{i}"),
                full_name: format!("Student {i}"),
                roll_number: i.to_string(),
                ..Default::default()
            })
            .collect();
        let job = GenerationJob::new(students, DocumentKind::Marksheet);
        let config = GenerationConfig::builder().quality_scale(1).build().unwrap();

        let results: Vec<EntityResult> =
            run_job_stream(job, config).await.unwrap().collect().await;
        let ids: Vec<&str> = results.iter().map(|r| r.entity_id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3"]);
        assert!(results.iter().all(|r| r.is_success()));
    }
}
