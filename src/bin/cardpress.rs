//! CLI binary for cardpress.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig`/`GenerationJob` and writes the archive.

use anyhow::{Context, Result};
use cardpress::{
    load_roster, run_job, run_single, sort_for_print, CardSide, DocumentKind, GenerationConfig,
    GenerationJob, JobParams, JobProgressCallback, ProgressCallback, StudentFilter,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per student.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Bar length is set by `on_job_start` once the roster is counted.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Loading roster…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} students  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_start(&self, total_entities: usize) {
        self.activate_bar(total_entities);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating documents for {total_entities} students…"))
        ));
    }

    fn on_entity_start(&self, index: usize, _total: usize, entity_id: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(format!("student {entity_id}"));
    }

    fn on_entity_complete(&self, index: usize, total: usize, entity_id: &str, bytes: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} {:>4}/{:<4}  {:<12}  {:<10}  {}",
            green("✓"),
            index + 1,
            total,
            entity_id,
            dim(&format!("{bytes:>6} B")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_entity_error(&self, index: usize, total: usize, entity_id: &str, error: &str) {
        self.start_times.lock().unwrap().remove(&index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>4}/{:<4}  {:<12}  {}",
            red("✗"),
            index + 1,
            total,
            entity_id,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_job_complete(&self, total_entities: usize, generated: usize) {
        let failed = total_entities.saturating_sub(generated);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} documents generated",
                green("✔"),
                bold(&generated.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents generated  ({} failed)",
                if failed == total_entities {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&generated.to_string()),
                total_entities,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # All students, two-sided ID cards, ZIP next to the roster
  cardpress students.json --doc card

  # Class 9 only, front side, with job-level validity dates
  cardpress students.json --doc card --side front --class 9 \
      --issue 2025-04-01 --expiry 2026-03-31

  # Marksheets for an explicit set of roll numbers
  cardpress students.json --doc marksheet --ids 14,19,23 \
      --exam-title "Mid Term" --max-marks 100 --min-marks 33

  # One student's admission form as a bare PDF
  cardpress students.json --doc form --single 14 -o 14_form.pdf

  # JSON result report for scripting
  cardpress students.json --doc card --json > report.json

ASSETS:
  Card backgrounds (card_front.jpg, card_back.jpg) and the watermark logo
  (logo.png) are read from --assets (default ./assets). A missing background
  fails those students; a missing logo just skips the watermark.

NETWORK:
  Student photos are fetched from each record's photoUrl; QR codes come from
  the barcode endpoint. Both are best-effort: unreachable assets leave a gap
  on the page instead of failing the batch.
"#;

/// Generate student ID cards, admission forms, and marksheets as a ZIP of
/// PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "cardpress",
    version,
    about = "Batch-generate student ID cards, admission forms, and marksheets",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Roster JSON file (array of student records).
    roster: PathBuf,

    /// Document type to generate.
    #[arg(long = "doc", value_enum, default_value = "card", env = "CARDPRESS_DOC")]
    doc: DocArg,

    /// Card side(s): front, back, both. Ignored for forms and marksheets.
    #[arg(long, value_enum, default_value = "both", env = "CARDPRESS_SIDE")]
    side: SideArg,

    /// Write the archive (or single PDF) to this path instead of the
    /// default name.
    #[arg(short, long, env = "CARDPRESS_OUTPUT")]
    output: Option<PathBuf>,

    /// Only students admitted for this class/level.
    #[arg(long, env = "CARDPRESS_CLASS")]
    class: Option<String>,

    /// Comma-separated identifier set (store id, roll, or GR number).
    #[arg(long, value_delimiter = ',')]
    ids: Vec<String>,

    /// Generate for exactly one student (by id/roll/GR) and emit a bare
    /// PDF — no archive.
    #[arg(long)]
    single: Option<String>,

    /// Custom template JSON file(s) overriding the built-in layout; repeat
    /// the flag for multi-page documents (pages render in the order given).
    #[arg(long = "template", conflicts_with = "single")]
    templates: Vec<PathBuf>,

    /// Job-level issue date override (used when a record has none).
    #[arg(long)]
    issue: Option<String>,

    /// Job-level expiry date override (used when a record has none).
    #[arg(long)]
    expiry: Option<String>,

    /// School name for form/marksheet headers.
    #[arg(long, default_value = "Al Ghazali High School", env = "CARDPRESS_SCHOOL")]
    school: String,

    /// Exam title printed on marksheets.
    #[arg(long)]
    exam_title: Option<String>,

    /// Maximum marks per subject.
    #[arg(long, default_value_t = 100)]
    max_marks: u32,

    /// Minimum passing marks per subject.
    #[arg(long, default_value_t = 0)]
    min_marks: u32,

    /// Directory holding template rasters.
    #[arg(long, default_value = "assets", env = "CARDPRESS_ASSETS")]
    assets: PathBuf,

    /// Concurrent asset fetches.
    #[arg(short, long, default_value_t = 6, env = "CARDPRESS_CONCURRENCY")]
    concurrency: usize,

    /// Per-asset fetch timeout in seconds.
    #[arg(long, default_value_t = 8, env = "CARDPRESS_FETCH_TIMEOUT")]
    fetch_timeout: u64,

    /// Chroma-key brightness threshold (0–255).
    #[arg(long, default_value_t = 240, env = "CARDPRESS_CHROMA_THRESHOLD")]
    chroma_threshold: u8,

    /// Page rasterisation supersampling factor (1–6).
    #[arg(long, default_value_t = 3, env = "CARDPRESS_QUALITY_SCALE")]
    quality_scale: u32,

    /// Barcode/QR rendering endpoint.
    #[arg(long, env = "CARDPRESS_BARCODE_ENDPOINT")]
    barcode_endpoint: Option<String>,

    /// Print a JSON result report to stdout instead of the text summary.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DocArg {
    Card,
    Form,
    Marksheet,
}

impl From<DocArg> for DocumentKind {
    fn from(v: DocArg) -> Self {
        match v {
            DocArg::Card => DocumentKind::IdCard,
            DocArg::Form => DocumentKind::AdmissionForm,
            DocArg::Marksheet => DocumentKind::Marksheet,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SideArg {
    Front,
    Back,
    Both,
}

impl From<SideArg> for CardSide {
    fn from(v: SideArg) -> Self {
        match v {
            SideArg::Front => CardSide::Front,
            SideArg::Back => CardSide::Back,
            SideArg::Both => CardSide::Both,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the progress bar is active;
    // the bar is the feedback channel.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && cli.single.is_none();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Roster selection ─────────────────────────────────────────────────
    let mut students = load_roster(&cli.roster)
        .with_context(|| format!("Failed to load roster {:?}", cli.roster))?;

    let filter = if !cli.ids.is_empty() {
        StudentFilter::Ids(cli.ids.clone())
    } else if let Some(class) = cli.class.clone() {
        StudentFilter::Level(class)
    } else {
        StudentFilter::All
    };
    students = filter.apply(students);
    sort_for_print(&mut students);

    let params = JobParams {
        issue_date: cli.issue.as_deref().and_then(cardpress::model::parse_date_flexible),
        expiry_date: cli.expiry.as_deref().and_then(cardpress::model::parse_date_flexible),
        school: cli.school.clone(),
        exam_title: cli.exam_title.clone(),
        max_marks_per_subject: cli.max_marks,
        min_marks_per_subject: cli.min_marks,
    };

    let kind: DocumentKind = cli.doc.into();
    let side: CardSide = cli.side.into();

    // ── Single-student path: bare PDF, no archive ────────────────────────
    if let Some(wanted) = &cli.single {
        let student = students
            .iter()
            .find(|s| {
                &s.id == wanted || &s.roll_number == wanted || &s.gr_number == wanted
            })
            .with_context(|| format!("No student '{wanted}' in the selection"))?;

        let config = build_config(&cli, None)?;
        let bytes = run_single(student, kind, side, &params, &config)
            .await
            .context("Document generation failed")?;

        let out_path = cli.output.clone().unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}_{}.pdf",
                student.archive_stem(),
                kind.entry_suffix()
            ))
        });
        std::fs::write(&out_path, &bytes)
            .with_context(|| format!("Failed to write {:?}", out_path))?;
        if !cli.quiet {
            eprintln!(
                "{} {}  {}",
                green("✔"),
                bold(&out_path.display().to_string()),
                dim(&format!("{} B", bytes.len())),
            );
        }
        return Ok(());
    }

    // ── Batch path ───────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn JobProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    let mut job = GenerationJob::new(students, kind)
        .with_side(side)
        .with_params(params);
    if !cli.templates.is_empty() {
        let mut templates = Vec::with_capacity(cli.templates.len());
        for path in &cli.templates {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read template {path:?}"))?;
            templates.push(
                cardpress::DocumentTemplate::from_json(&json)
                    .with_context(|| format!("Failed to parse template {path:?}"))?,
            );
        }
        job = job.with_templates(templates);
    }

    let output = run_job(&job, &config)
        .await
        .context("Batch generation failed")?;

    let out_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&output.archive_name));
    output
        .write_archive(&out_path)
        .await
        .with_context(|| format!("Failed to write {:?}", out_path))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if !cli.quiet {
        eprintln!(
            "{}  {}  →  {}",
            if output.stats.failed == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            output.summary(),
            bold(&out_path.display().to_string()),
        );
        for failure in output.failures() {
            eprintln!("   {} {}", red("✗"), failure);
        }
    }

    Ok(())
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .concurrency(cli.concurrency)
        .fetch_timeout_secs(cli.fetch_timeout)
        .chroma_threshold(cli.chroma_threshold)
        .quality_scale(cli.quality_scale)
        .asset_dir(cli.assets.clone());

    if let Some(endpoint) = &cli.barcode_endpoint {
        builder = builder.barcode_endpoint(endpoint.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
