//! Pipeline stages for batch document generation.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different barcode provider) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! roster ──▶ fetch ──▶ compositor ──▶ layout ──▶ archive
//! (records)  (photos,   (crop, key,    (canvas +   (ZIP)
//!             QR)        fade)          PDF text)
//! ```
//!
//! 1. [`fetch`]      — resolve photo URLs and barcode renders to bytes; the
//!    only stage with network I/O, and the only one allowed to suspend
//! 2. [`compositor`] — pure per-pixel transforms, one allocation per call,
//!    safe to run from any number of tasks
//! 3. [`layout`]     — interpret template directives for one student into
//!    encoded PDF bytes; CPU-bound, runs to completion
//! 4. [`archive`]    — sequential ZIP packaging with deterministic naming
//! 5. [`format`]     — the deterministic text rules (Roman numerals, dates,
//!    name sanitisation) shared by the stages above
//! 6. [`metrics`]    — Helvetica advance widths for centered placement

pub mod archive;
pub mod compositor;
pub mod fetch;
pub mod format;
pub mod layout;
pub mod metrics;
