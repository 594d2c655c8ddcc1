//! User-visible failure taxonomy for the scan pipeline.

use crate::decoder::Symbology;

pub type ScanResult<T> = std::result::Result<T, ScanError>;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Decoder or camera capability missing on this platform. Scanning is
    /// unavailable but stored records can still be viewed.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Camera permission denied or no hardware; the session stays idle.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),

    /// Decoded payload does not match the identifier grammar.
    #[error("invalid {symbology} code: {payload:?}")]
    InvalidCode {
        payload: String,
        symbology: Symbology,
    },

    #[error("record store I/O failed: {0}")]
    StoreIo(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("a scanning session is already active")]
    AlreadyScanning,

    #[error("navigation is locked while scanning")]
    NavigationLocked,
}

impl ScanError {
    pub fn store(err: anyhow::Error) -> Self {
        ScanError::StoreIo(err.into())
    }

    /// True for failures that abort a single scan without tearing down the
    /// camera session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScanError::InvalidCode { .. } | ScanError::StoreIo(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_keeps_context_chain() {
        let err = anyhow::anyhow!("disk full").context("failed to insert scan record");
        let scan_err = ScanError::store(err);
        let rendered = scan_err.to_string();
        assert!(rendered.starts_with("record store I/O failed"));
        assert!(rendered.contains("failed to insert scan record"));
        assert!(scan_err.is_recoverable());
    }

    #[test]
    fn device_errors_are_not_recoverable() {
        assert!(!ScanError::DeviceUnavailable("no camera".into()).is_recoverable());
        assert!(!ScanError::UnsupportedPlatform("no decoder".into()).is_recoverable());
    }
}
