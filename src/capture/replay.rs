use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image::RgbImage;
use log::{debug, info};

use super::camera::{Camera, FacingMode, MediaStream};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Camera that plays back still images from a directory, in file-name order,
/// looping forever. Each image is held for `hold_frames` consecutive grabs so
/// it stays "in view" across several sampling ticks, like a card held up to
/// a lens.
pub struct ReplayCamera {
    dir: PathBuf,
    hold_frames: u32,
}

impl ReplayCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            hold_frames: 5,
        }
    }

    pub fn with_hold_frames(mut self, hold_frames: u32) -> Self {
        self.hold_frames = hold_frames.max(1);
        self
    }
}

impl Camera for ReplayCamera {
    fn open(&self, facing: FacingMode) -> Result<Box<dyn MediaStream>> {
        debug!("Replay camera ignores facing mode {facing}");
        let frames = list_frames(&self.dir)?;
        info!(
            "Replaying {} frames from {}",
            frames.len(),
            self.dir.display()
        );
        Ok(Box::new(ReplayStream {
            frames,
            position: 0,
            held: 0,
            hold_frames: self.hold_frames,
            resolution: (0, 0),
            stopped: false,
        }))
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("cannot open replay directory {}", dir.display()))?;

    let mut frames: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();

    if frames.is_empty() {
        bail!("no image frames in {}", dir.display());
    }
    Ok(frames)
}

struct ReplayStream {
    frames: Vec<PathBuf>,
    position: usize,
    held: u32,
    hold_frames: u32,
    resolution: (u32, u32),
    stopped: bool,
}

impl ReplayStream {
    fn load(&self, index: usize) -> Result<RgbImage> {
        let path = &self.frames[index];
        Ok(image::open(path)
            .with_context(|| format!("failed to decode frame {}", path.display()))?
            .to_rgb8())
    }
}

impl MediaStream for ReplayStream {
    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn wait_until_playing(&mut self, _timeout: Duration) -> Result<()> {
        if self.stopped {
            bail!("replay stream already stopped");
        }
        // Frames are local files; the first successful decode means playback.
        let first = self.load(0)?;
        self.resolution = first.dimensions();
        Ok(())
    }

    fn current_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.stopped {
            return Ok(None);
        }
        let frame = self.load(self.position)?;
        self.resolution = frame.dimensions();

        self.held += 1;
        if self.held >= self.hold_frames {
            self.held = 0;
            self.position = (self.position + 1) % self.frames.len();
        }
        Ok(Some(frame))
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "rollscan_replay_{}_{}_{}",
            std::process::id(),
            uuid::Uuid::new_v4(),
            name
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_directory_is_unavailable() {
        let camera = ReplayCamera::new("/definitely/not/here");
        assert!(camera.open(FacingMode::Environment).is_err());
    }

    #[test]
    fn directory_without_images_is_unavailable() {
        let dir = temp_dir("empty");
        std::fs::write(dir.join("notes.txt"), "x").unwrap();
        assert!(ReplayCamera::new(&dir).open(FacingMode::Environment).is_err());
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn frames_are_held_then_advance_in_name_order() {
        let dir = temp_dir("frames");
        RgbImage::from_pixel(8, 4, Rgb([10, 10, 10]))
            .save(dir.join("a.png"))
            .unwrap();
        RgbImage::from_pixel(8, 4, Rgb([250, 250, 250]))
            .save(dir.join("b.png"))
            .unwrap();

        let mut stream = ReplayCamera::new(&dir)
            .with_hold_frames(2)
            .open(FacingMode::Environment)
            .unwrap();
        stream.wait_until_playing(Duration::from_secs(1)).unwrap();
        assert_eq!(stream.resolution(), (8, 4));

        let shades: Vec<u8> = (0..5)
            .map(|_| stream.current_frame().unwrap().unwrap().get_pixel(0, 0).0[0])
            .collect();
        assert_eq!(shades, [10, 10, 250, 250, 10]);

        stream.stop();
        assert!(stream.current_frame().unwrap().is_none());
        std::fs::remove_dir_all(dir).unwrap();
    }
}
