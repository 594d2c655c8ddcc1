use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use image::GrayImage;
use log::debug;

use super::camera::MediaStream;
use crate::sampler::crop::{crop_rect, rasterize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    /// No stream attached.
    Inert,
    /// Stream attached, frames not yet flowing.
    MetadataLoaded,
    Playing,
}

/// Display surface a stream is bound to. `display_size` is the on-screen
/// size the operator sees, which decides the crop applied before decoding.
pub struct VideoSurface {
    stream: Option<Box<dyn MediaStream>>,
    state: SurfaceState,
    display_size: (u32, u32),
}

impl VideoSurface {
    pub fn new(display_width: u32, display_height: u32) -> Self {
        Self {
            stream: None,
            state: SurfaceState::Inert,
            display_size: (display_width, display_height),
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn bind(&mut self, stream: Box<dyn MediaStream>) {
        self.reset();
        self.stream = Some(stream);
        self.state = SurfaceState::MetadataLoaded;
    }

    /// Wait for the bound stream to start rendering.
    pub fn play(&mut self, timeout: Duration) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            bail!("no stream bound to the video surface");
        };
        stream.wait_until_playing(timeout)?;
        self.state = SurfaceState::Playing;
        debug!("Video surface playing at {:?}", stream.resolution());
        Ok(())
    }

    /// Stop every track and drop the stream.
    pub fn reset(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.state = SurfaceState::Inert;
    }

    /// Grab the current frame, crop it to the display aspect ratio and scale
    /// it into a `width`×`height` buffer. `None` when not playing or when no
    /// frame is ready.
    pub fn sample(&mut self, width: u32, height: u32) -> Result<Option<GrayImage>> {
        if self.state != SurfaceState::Playing {
            return Ok(None);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        let Some(frame) = stream.current_frame()? else {
            return Ok(None);
        };

        let (video_w, video_h) = frame.dimensions();
        let (display_w, display_h) = self.display_size;
        let rect = crop_rect(video_w, video_h, display_w, display_h);
        Ok(Some(rasterize(&frame, rect, width, height)))
    }
}

impl Drop for VideoSurface {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Shared between the capture controller and the sampling loop.
#[derive(Clone)]
pub struct SurfaceHandle(Arc<Mutex<VideoSurface>>);

impl SurfaceHandle {
    pub fn new(surface: VideoSurface) -> Self {
        Self(Arc::new(Mutex::new(surface)))
    }

    pub fn lock(&self) -> MutexGuard<'_, VideoSurface> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct StillStream {
        pub frame: RgbImage,
        pub stops: Arc<AtomicUsize>,
    }

    impl MediaStream for StillStream {
        fn resolution(&self) -> (u32, u32) {
            self.frame.dimensions()
        }

        fn wait_until_playing(&mut self, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        fn current_frame(&mut self) -> Result<Option<RgbImage>> {
            Ok(Some(self.frame.clone()))
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn still(stops: &Arc<AtomicUsize>) -> Box<dyn MediaStream> {
        Box::new(StillStream {
            frame: RgbImage::from_pixel(1920, 1080, Rgb([200, 200, 200])),
            stops: stops.clone(),
        })
    }

    #[test]
    fn samples_only_while_playing() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut surface = VideoSurface::new(640, 320);
        assert!(surface.sample(640, 320).unwrap().is_none());

        surface.bind(still(&stops));
        assert_eq!(surface.state(), SurfaceState::MetadataLoaded);
        assert!(surface.sample(640, 320).unwrap().is_none());

        surface.play(Duration::from_secs(1)).unwrap();
        let buffer = surface.sample(640, 320).unwrap().unwrap();
        assert_eq!(buffer.dimensions(), (640, 320));
    }

    #[test]
    fn reset_releases_stream_once() {
        let stops = Arc::new(AtomicUsize::new(0));
        let mut surface = VideoSurface::new(640, 320);
        surface.bind(still(&stops));
        surface.play(Duration::from_secs(1)).unwrap();

        surface.reset();
        surface.reset();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(surface.state(), SurfaceState::Inert);
        assert!(surface.play(Duration::from_secs(1)).is_err());
    }
}
