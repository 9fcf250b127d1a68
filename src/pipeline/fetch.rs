//! Auxiliary asset retrieval: photos by URL, barcode/QR renders from the
//! configured endpoint.
//!
//! ## The fail-soft contract
//!
//! `fetch` returns `Option<Vec<u8>>` and **never** an error. A network
//! failure, a non-2xx status, a timeout or an empty body all resolve to
//! `None`, which callers must read as "omit this visual element and keep
//! laying out the document". One missing photo or one failed barcode render
//! must never abort document generation for a student, let alone the batch —
//! this is the single most important invariant of the whole pipeline, so it
//! is enforced here at the transport boundary rather than left to call
//! sites.

use crate::config::GenerationConfig;
use std::time::Duration;
use tracing::{debug, warn};

/// A logical reference to an asset the layout engine wants placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// Direct image URL (student photo).
    Url(String),
    /// Ask the rendering endpoint for a barcode/QR image of the given pixel
    /// size encoding `payload`.
    Barcode {
        payload: String,
        width: u32,
        height: u32,
    },
}

/// HTTP fetcher with a per-request timeout, shared by all concurrent
/// per-student fetch tasks.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl AssetFetcher {
    pub fn new(config: &GenerationConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: config.barcode_endpoint.clone(),
        }
    }

    /// Resolve a reference to raw image bytes, or `None` on any failure.
    pub async fn fetch(&self, reference: &AssetRef) -> Option<Vec<u8>> {
        let url = match reference {
            AssetRef::Url(u) => u.clone(),
            AssetRef::Barcode {
                payload,
                width,
                height,
            } => self.barcode_url(payload, *width, *height)?,
        };

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Asset fetch failed for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Asset fetch for {} returned HTTP {}", url, response.status());
            return None;
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Asset body read failed for {}: {}", url, e);
                return None;
            }
        };

        if bytes.is_empty() {
            warn!("Asset fetch for {} returned an empty body", url);
            return None;
        }

        debug!("Fetched asset {} → {} bytes", url, bytes.len());
        Some(bytes.to_vec())
    }

    /// Build the rendering-endpoint URL for a barcode request. The payload
    /// is percent-encoded into the query string; newline separators between
    /// labeled lines survive as `%0A`.
    fn barcode_url(&self, payload: &str, width: u32, height: u32) -> Option<String> {
        let url = reqwest::Url::parse_with_params(
            &self.endpoint,
            &[
                ("size", format!("{width}x{height}")),
                ("data", payload.to_string()),
            ],
        )
        .ok()?;
        Some(url.into())
    }
}
