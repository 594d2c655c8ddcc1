use std::fmt;
use std::time::Duration;

use anyhow::Result;
use image::RgbImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    /// Rear camera, pointing away from the operator.
    #[default]
    Environment,
    User,
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacingMode::Environment => f.write_str("environment"),
            FacingMode::User => f.write_str("user"),
        }
    }
}

/// Camera device capable of producing a video stream. `open` may block while
/// the platform asks for permission; callers run it on the blocking pool.
pub trait Camera: Send + Sync + 'static {
    /// Request a video-only stream. Any error means no usable camera:
    /// permission denied, no hardware, or the device is busy.
    fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>>;
}

/// A live video stream. All methods may block.
pub trait MediaStream: Send + 'static {
    /// Native frame size (width, height) once metadata is known.
    fn resolution(&self) -> (u32, u32);

    /// Block until frames are actually being delivered, not merely until
    /// metadata has loaded.
    fn wait_until_playing(&mut self, timeout: Duration) -> Result<()>;

    /// Most recent frame, or `None` if no new frame is available.
    fn current_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Release every hardware track. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Stand-in when no capture device is configured. Every open fails, so the
/// session stays idle while stored records remain viewable.
pub struct NoCamera;

impl Camera for NoCamera {
    fn open(&self, _facing: FacingMode) -> Result<Box<dyn MediaStream>> {
        anyhow::bail!("no camera device configured")
    }
}
