//! Camera acquisition and the video surface frames are sampled from.

pub mod camera;
pub mod controller;
pub mod replay;
pub mod surface;

pub use camera::{Camera, FacingMode, MediaStream, NoCamera};
pub use controller::{unsupported_reason, CaptureController};
pub use replay::ReplayCamera;
pub use surface::{SurfaceHandle, SurfaceState, VideoSurface};
