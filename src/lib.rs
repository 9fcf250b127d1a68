//! # cardpress
//!
//! Batch student document generation: ID cards, admission forms, and exam
//! marksheets, rendered to print-exact PDF and packaged into a single ZIP
//! archive.
//!
//! ## Why this crate?
//!
//! School front offices generate the same three documents for hundreds of
//! students at a time, from the same roster, against the same fixed page
//! layouts. The hard parts are not the forms — they are the raster work
//! (circular photo crops, stripping the white backing off rendered QR
//! codes), the unreliable asset sources (photo hosts, third-party barcode
//! endpoints), and keeping one bad record from sinking a 200-student
//! export. This crate packages those parts behind a template interpreter
//! with strict failure tiers.
//!
//! ## Pipeline Overview
//!
//! ```text
//! roster
//!  │
//!  ├─ 1. Select   filter + print-sort student records
//!  ├─ 2. Fetch    photos & barcode renders, concurrent, fail-soft
//!  ├─ 3. Composite circular crop / chroma-key / fade on a page canvas
//!  ├─ 4. Layout   template directives → PDF pages (front before back)
//!  ├─ 5. Package  successes → ZIP, deterministic entry names
//!  └─ 6. Report   per-student results + failure summary
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cardpress::{run_job, DocumentKind, GenerationConfig, GenerationJob};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let students = cardpress::load_roster("students.json".as_ref())?;
//!     let job = GenerationJob::new(students, DocumentKind::IdCard);
//!     let output = run_job(&job, &GenerationConfig::default()).await?;
//!     std::fs::write(&output.archive_name, &output.archive)?;
//!     eprintln!("{}", output.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Failure tiers
//!
//! | Tier | Example | Recovery |
//! |------|---------|----------|
//! | Asset | photo host timeout | element omitted, page continues |
//! | Directive | undecodable barcode bytes | directive skipped, logged |
//! | Entity | missing name, unusable background | student recorded as failed, batch continues |
//! | Job | empty roster, zero successes | the only `Err` the caller sees |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod roster;
pub mod stream;
pub mod template;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder, DEFAULT_BARCODE_ENDPOINT};
pub use error::{EntityError, GenerationError};
pub use job::{run_job, run_single, templates_for};
pub use model::{
    parse_date_flexible, CardSide, ComputedField, DocumentKind, Field, GenerationJob, JobParams,
    StudentRecord, SubjectMark,
};
pub use output::{EntityResult, JobOutput, JobStats};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use roster::{load_roster, sort_for_print, StudentFilter};
pub use stream::{run_job_stream, EntityStream};
pub use template::{DocumentTemplate, PlacementDirective};
