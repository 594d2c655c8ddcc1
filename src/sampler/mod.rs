//! Periodic frame sampling: crop the live video to the display's region of
//! interest, scale it into a fixed buffer and hand it to the decoder.

pub mod crop;
pub mod loop_worker;

use std::time::Duration;

pub use crop::{crop_rect, rasterize, CropRect};
pub use loop_worker::{sampling_loop, SamplerContext};

pub const DEFAULT_BUFFER_WIDTH: u32 = 640;
pub const DEFAULT_BUFFER_HEIGHT: u32 = 320;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    pub interval: Duration,
    pub buffer_width: u32,
    pub buffer_height: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            buffer_width: DEFAULT_BUFFER_WIDTH,
            buffer_height: DEFAULT_BUFFER_HEIGHT,
        }
    }
}
