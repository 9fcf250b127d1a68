//! End-to-end tests for the batch generation pipeline.
//!
//! Everything here runs offline: template backgrounds are generated into a
//! temp directory, photo URLs point at a closed local port so fetches
//! exercise the fail-soft path, and archives are verified by reading them
//! back.

use cardpress::{
    run_job, run_single, CardSide, DocumentKind, GenerationConfig, GenerationError,
    GenerationJob, StudentRecord,
};
use image::{Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn student(roll: &str, name: &str) -> StudentRecord {
    StudentRecord {
        id: format!("s-{roll}"),
        full_name: name.to_string(),
        father_name: "Guardian Name".to_string(),
        admission_for: "9".to_string(),
        roll_number: roll.to_string(),
        gr_number: format!("gr-{roll}"),
        phone_number: "0300-1234567".to_string(),
        ..Default::default()
    }
}

/// Write card backgrounds and a logo into a temp asset dir.
fn asset_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_raster(dir.path(), "card_front.jpg", Rgb([205, 215, 240]));
    write_raster(dir.path(), "card_back.jpg", Rgb([240, 215, 205]));
    write_raster(dir.path(), "logo.png", Rgb([83, 36, 42]));
    dir
}

fn write_raster(dir: &Path, name: &str, color: Rgb<u8>) {
    RgbImage::from_pixel(189, 321, color)
        .save(dir.join(name))
        .unwrap();
}

fn config_with_assets(dir: &TempDir) -> GenerationConfig {
    GenerationConfig::builder()
        .quality_scale(1)
        .fetch_timeout_secs(1)
        .asset_dir(dir.path())
        .build()
        .unwrap()
}

fn entry_names(archive: &[u8]) -> Vec<String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive.to_vec())).unwrap();
    (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect()
}

fn count_pdf_pages(bytes: &[u8]) -> usize {
    let haystack = String::from_utf8_lossy(bytes);
    // lopdf serialises dictionary entries without a space between the key and
    // value name tokens (`/Type/Page`); some versions emit `/Type /Page`.
    // Normalise so the count is independent of that spacing.
    let normalized = haystack.replace("/Type /Page", "/Type/Page");
    normalized.matches("/Type/Page").count() - normalized.matches("/Type/Pages").count()
}

// ── Fail-soft fetch ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_photo_host_degrades_instead_of_failing() {
    let dir = asset_dir();
    let mut s = student("14", "Ahmed Khan");
    // Nothing listens here: both the photo fetch and the QR fetch (the
    // endpoint is overridden to the same dead port) resolve to None.
    s.photo_url = Some("http://127.0.0.1:9/photo.jpg".to_string());
    let config = GenerationConfig::builder()
        .quality_scale(1)
        .fetch_timeout_secs(1)
        .asset_dir(dir.path())
        .barcode_endpoint("http://127.0.0.1:9/qr")
        .build()
        .unwrap();

    let job = GenerationJob::new(vec![s], DocumentKind::IdCard).with_side(CardSide::Both);
    let output = run_job(&job, &config).await.unwrap();

    assert_eq!(output.stats.generated, 1);
    assert_eq!(output.stats.failed, 0);
    let doc = output.results[0].document.as_ref().unwrap();
    assert!(doc.starts_with(b"%PDF"));
}

// ── Batch isolation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn one_bad_student_does_not_sink_the_batch() {
    let dir = asset_dir();
    let mut students: Vec<StudentRecord> = (1..=5)
        .map(|i| student(&i.to_string(), &format!("Student {i}")))
        .collect();
    // Student #3 cannot be laid out: the required name field is blank.
    students[2].full_name = String::new();

    let job = GenerationJob::new(students, DocumentKind::IdCard).with_side(CardSide::Front);
    let output = run_job(&job, &config_with_assets(&dir)).await.unwrap();

    assert_eq!(output.results.len(), 5);
    assert_eq!(output.stats.generated, 4);
    assert_eq!(output.stats.failed, 1);

    let failures: Vec<_> = output.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].entity(), "3");

    let names = entry_names(&output.archive);
    assert_eq!(names.len(), 4);
    assert!(!names.iter().any(|n| n.starts_with("3_")));
}

// ── Empty terminal state ─────────────────────────────────────────────────────

#[tokio::test]
async fn zero_successes_yields_no_archive() {
    let dir = asset_dir();
    let students: Vec<StudentRecord> = (1..=3)
        .map(|i| {
            let mut s = student(&i.to_string(), "");
            s.full_name = String::new();
            s
        })
        .collect();

    let job = GenerationJob::new(students, DocumentKind::IdCard).with_side(CardSide::Front);
    let err = run_job(&job, &config_with_assets(&dir)).await.unwrap_err();
    match err {
        GenerationError::AllEntitiesFailed { total, .. } => assert_eq!(total, 3),
        other => panic!("expected AllEntitiesFailed, got {other}"),
    }
}

#[tokio::test]
async fn missing_background_fails_per_student_not_per_job() {
    // Empty asset dir: the card background cannot load, so every student
    // fails at the page-construction tier and the job reports the terminal
    // "nothing to export" condition.
    let dir = TempDir::new().unwrap();
    let job = GenerationJob::new(
        vec![student("1", "Ahmed Khan"), student("2", "Sara Iqbal")],
        DocumentKind::IdCard,
    )
    .with_side(CardSide::Front);

    let err = run_job(&job, &config_with_assets(&dir)).await.unwrap_err();
    assert!(matches!(err, GenerationError::AllEntitiesFailed { total: 2, .. }));
}

// ── Naming determinism & sanitisation ────────────────────────────────────────

#[tokio::test]
async fn entry_names_are_sanitised_and_stable_across_runs() {
    let dir = asset_dir();
    let mut s = student("14", "Ahmed Khan");
    s.roll_number = "12/A".to_string();

    let job = GenerationJob::new(vec![s], DocumentKind::IdCard).with_side(CardSide::Front);
    let config = config_with_assets(&dir);

    let first = run_job(&job, &config).await.unwrap();
    assert_eq!(entry_names(&first.archive), ["12_A_card.pdf"]);

    let second = run_job(&job, &config).await.unwrap();
    assert_eq!(entry_names(&second.archive), ["12_A_card.pdf"]);
}

#[tokio::test]
async fn duplicate_identifiers_keep_the_entry_count_invariant() {
    let dir = asset_dir();
    let job = GenerationJob::new(
        vec![student("14", "Ahmed Khan"), student("14", "Other Ahmed")],
        DocumentKind::IdCard,
    )
    .with_side(CardSide::Front);

    let output = run_job(&job, &config_with_assets(&dir)).await.unwrap();
    assert_eq!(output.stats.generated, 2);
    assert_eq!(
        entry_names(&output.archive),
        ["14_card.pdf", "14_card_2.pdf"]
    );
}

// ── Two-sided ordering ───────────────────────────────────────────────────────

#[tokio::test]
async fn both_sides_render_two_pages_per_card() {
    let dir = asset_dir();
    let job = GenerationJob::new(vec![student("7", "Sara Iqbal")], DocumentKind::IdCard)
        .with_side(CardSide::Both);

    let output = run_job(&job, &config_with_assets(&dir)).await.unwrap();
    let doc = output.results[0].document.as_ref().unwrap();
    assert_eq!(count_pdf_pages(doc), 2);

    let front_only = GenerationJob::new(vec![student("7", "Sara Iqbal")], DocumentKind::IdCard)
        .with_side(CardSide::Front);
    let output = run_job(&front_only, &config_with_assets(&dir)).await.unwrap();
    let doc = output.results[0].document.as_ref().unwrap();
    assert_eq!(count_pdf_pages(doc), 1);
}

// ── Order preservation ───────────────────────────────────────────────────────

#[tokio::test]
async fn archive_listing_preserves_roster_order() {
    let dir = asset_dir();
    let students = vec![
        student("3", "Third"),
        student("1", "First"),
        student("2", "Second"),
    ];
    let job = GenerationJob::new(students, DocumentKind::IdCard).with_side(CardSide::Front);
    let output = run_job(&job, &config_with_assets(&dir)).await.unwrap();

    // Roster order, not identifier order.
    assert_eq!(
        entry_names(&output.archive),
        ["3_card.pdf", "1_card.pdf", "2_card.pdf"]
    );
    let result_ids: Vec<&str> = output.results.iter().map(|r| r.entity_id.as_str()).collect();
    assert_eq!(result_ids, ["3", "1", "2"]);
}

// ── Cancellation ─────────────────────────────────────────────────────────────

struct CancelAfterFirst {
    config: GenerationConfig,
}

impl cardpress::JobProgressCallback for CancelAfterFirst {
    fn on_entity_complete(&self, _index: usize, _total: usize, _id: &str, _bytes: usize) {
        self.config.cancel();
    }
}

#[tokio::test]
async fn cancellation_keeps_completed_work_and_accounts_for_the_rest() {
    let dir = asset_dir();
    let mut config = config_with_assets(&dir);
    config.progress_callback = Some(std::sync::Arc::new(CancelAfterFirst {
        config: config.clone(),
    }));

    let students: Vec<StudentRecord> = (1..=4)
        .map(|i| student(&i.to_string(), &format!("Student {i}")))
        .collect();
    let job = GenerationJob::new(students, DocumentKind::IdCard).with_side(CardSide::Front);

    let output = run_job(&job, &config).await.unwrap();
    assert_eq!(output.results.len(), 4);
    assert_eq!(output.stats.generated, 1);
    assert_eq!(output.stats.cancelled, 3);
    assert_eq!(entry_names(&output.archive).len(), 1);
}

// ── Single-document path ─────────────────────────────────────────────────────

#[tokio::test]
async fn single_student_returns_bare_document_bytes() {
    let s = student("14", "Ahmed Khan");
    let config = GenerationConfig::builder().quality_scale(1).build().unwrap();
    let bytes = run_single(
        &s,
        DocumentKind::Marksheet,
        CardSide::Both,
        &cardpress::JobParams::default(),
        &config,
    )
    .await
    .unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(count_pdf_pages(&bytes), 1);
}

// ── Marksheet content path ───────────────────────────────────────────────────

#[tokio::test]
async fn marksheets_generate_for_a_whole_class() {
    let students: Vec<StudentRecord> = (1..=3u32)
        .map(|i| {
            let mut s = student(&i.to_string(), &format!("Student {i}"));
            s.marks = vec![
                cardpress::SubjectMark {
                    subject: "Mathematics".into(),
                    score: 70 + i,
                },
                cardpress::SubjectMark {
                    subject: "English".into(),
                    score: 60 + i,
                },
            ];
            s
        })
        .collect();

    let config = GenerationConfig::builder().quality_scale(1).build().unwrap();
    let job = GenerationJob::new(students, DocumentKind::Marksheet);
    let output = run_job(&job, &config).await.unwrap();

    assert_eq!(output.stats.generated, 3);
    assert_eq!(
        entry_names(&output.archive),
        [
            "1_marksheet.pdf",
            "2_marksheet.pdf",
            "3_marksheet.pdf"
        ]
    );
    assert_eq!(output.archive_name, "marksheets.zip");
}
