//! Configuration types for batch document generation.
//!
//! All generation behaviour is controlled through [`GenerationConfig`], built
//! via its [`GenerationConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across tasks, serialise them for logging, and
//! diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::GenerationError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default endpoint used to render QR images from a text payload.
///
/// The same third-party service the original card generator used. Any
/// endpoint accepting `?size=WxH&data=<urlencoded>` works.
pub const DEFAULT_BARCODE_ENDPOINT: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Configuration for one generation job.
///
/// Built via [`GenerationConfig::builder()`] or using
/// [`GenerationConfig::default()`].
///
/// # Example
/// ```rust
/// use cardpress::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .concurrency(4)
///     .fetch_timeout_secs(5)
///     .chroma_threshold(230)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Number of concurrent asset fetches. Range: ≥ 1. Default: 6.
    ///
    /// Asset retrieval (photos, QR renders) is network-bound and dominates
    /// job latency; document layout and compositing are CPU-bound and fast.
    /// Fanning out the fetch phase cuts wall-clock time without touching the
    /// archive writer, which stays single-threaded. If the barcode endpoint
    /// starts rejecting requests, lower this.
    pub concurrency: usize,

    /// Per-asset fetch timeout in seconds. Default: 8.
    ///
    /// On timeout the asset resolves to "absent" and the document is laid
    /// out without it — a slow photo host must never stall the batch.
    pub fetch_timeout_secs: u64,

    /// Brightness threshold for chroma-key transparency. Default: 240.
    ///
    /// Pixels with R, G and B all above this value become fully transparent,
    /// stripping the white backing plate that rendered QR images arrive on.
    /// Tuned for the default barcode endpoint; expose-don't-hardcode because
    /// other providers render on off-white backing.
    pub chroma_threshold: u8,

    /// Supersampling factor for page rasterisation. Range: 1–6. Default: 3.
    ///
    /// Backgrounds, photos and QR images are composited on a canvas rendered
    /// at `quality_scale ×` the page's point size, then embedded at matching
    /// DPI. 1× shows visible aliasing on circular photo edges when printed;
    /// 3× is indistinguishable from vector output at ID-card size.
    pub quality_scale: u32,

    /// Base URL of the barcode/QR rendering endpoint.
    /// Default: [`DEFAULT_BARCODE_ENDPOINT`].
    pub barcode_endpoint: String,

    /// Directory template background rasters are resolved against.
    /// Default: `assets`.
    pub asset_dir: PathBuf,

    /// Cooperative cancellation flag.
    ///
    /// Setting it stops the job from *starting* new per-student work;
    /// in-flight students finish or fail cleanly and the partial archive is
    /// still returned. Clone the config (the flag is shared) and call
    /// [`GenerationConfig::cancel`] from another task.
    pub(crate) cancelled: Arc<AtomicBool>,

    /// Optional per-student progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            concurrency: 6,
            fetch_timeout_secs: 8,
            chroma_threshold: 240,
            quality_scale: 3,
            barcode_endpoint: DEFAULT_BARCODE_ENDPOINT.to_string(),
            asset_dir: PathBuf::from("assets"),
            cancelled: Arc::new(AtomicBool::new(false)),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("concurrency", &self.concurrency)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("chroma_threshold", &self.chroma_threshold)
            .field("quality_scale", &self.quality_scale)
            .field("barcode_endpoint", &self.barcode_endpoint)
            .field("asset_dir", &self.asset_dir)
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn JobProgressCallback>"),
            )
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// Request cooperative cancellation of the job using this config.
    ///
    /// Students not yet started are recorded as cancelled; students already
    /// in flight complete normally.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn chroma_threshold(mut self, threshold: u8) -> Self {
        self.config.chroma_threshold = threshold;
        self
    }

    pub fn quality_scale(mut self, scale: u32) -> Self {
        self.config.quality_scale = scale.clamp(1, 6);
        self
    }

    pub fn barcode_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.barcode_endpoint = url.into();
        self
    }

    pub fn asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.asset_dir = dir.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, GenerationError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(GenerationError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.barcode_endpoint.is_empty() {
            return Err(GenerationError::InvalidConfig(
                "Barcode endpoint must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
