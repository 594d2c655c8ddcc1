//! Barcode decoding over rasterized frame buffers.

pub mod codabar;

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::GrayImage;
use serde::{Deserialize, Serialize};

pub use codabar::{render_symbol, CodabarDetector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    Codabar,
}

impl Symbology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::Codabar => "codabar",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedCode {
    pub format: Symbology,
    pub raw_value: String,
}

/// Platform barcode detector. Implementations are synchronous and may be
/// CPU heavy; callers run them on the blocking pool.
pub trait BarcodeDetector: Send + Sync + 'static {
    fn supported_formats(&self) -> Vec<Symbology>;

    /// All codes found in the buffer, in detection order. An empty vector
    /// means nothing was found and is not an error.
    fn detect(&self, buffer: &GrayImage) -> Result<Vec<DetectedCode>>;
}

/// Binds a detector to exactly one symbology and reduces each frame to at
/// most one payload.
#[derive(Clone)]
pub struct DecoderAdapter {
    detector: Arc<dyn BarcodeDetector>,
    symbology: Symbology,
}

impl DecoderAdapter {
    pub fn new(detector: Arc<dyn BarcodeDetector>, symbology: Symbology) -> Self {
        Self {
            detector,
            symbology,
        }
    }

    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    pub fn is_supported(&self) -> bool {
        self.detector.supported_formats().contains(&self.symbology)
    }

    /// First code of the configured symbology, if any. No ranking between
    /// several candidates in one frame.
    pub fn decode(&self, buffer: &GrayImage) -> Result<Option<String>> {
        let codes = self
            .detector
            .detect(buffer)
            .with_context(|| format!("{} detection failed", self.symbology))?;

        Ok(codes
            .into_iter()
            .find(|code| code.format == self.symbology)
            .map(|code| code.raw_value))
    }

    /// Async wrapper that moves the decode onto the blocking pool.
    pub async fn decode_async(&self, buffer: GrayImage) -> Result<Option<String>> {
        let adapter = self.clone();
        tokio::task::spawn_blocking(move || adapter.decode(&buffer))
            .await
            .context("decoder worker join failed")?
    }
}
