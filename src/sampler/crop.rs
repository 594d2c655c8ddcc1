//! Region-of-interest geometry and rasterization into the decoder buffer.

use image::{imageops, GrayImage, RgbImage};

/// Source rectangle in native video pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropRect {
    pub sx: f64,
    pub sy: f64,
    pub sw: f64,
    pub sh: f64,
}

/// Centre crop of a `video_w`×`video_h` frame matching the aspect ratio of
/// the `display_w`×`display_h` surface it is shown on. The longer dimension
/// is cut symmetrically.
pub fn crop_rect(video_w: u32, video_h: u32, display_w: u32, display_h: u32) -> CropRect {
    let (vw, vh) = (f64::from(video_w), f64::from(video_h));
    if display_w == 0 || display_h == 0 || video_w == 0 || video_h == 0 {
        return CropRect {
            sx: 0.0,
            sy: 0.0,
            sw: vw,
            sh: vh,
        };
    }

    let video_ratio = vw / vh;
    let display_ratio = f64::from(display_w) / f64::from(display_h);

    if video_ratio > display_ratio {
        // Source is wider: cut left and right.
        let sw = vh * display_ratio;
        CropRect {
            sx: (vw - sw) / 2.0,
            sy: 0.0,
            sw,
            sh: vh,
        }
    } else {
        // Source is taller: cut top and bottom.
        let sh = vw / display_ratio;
        CropRect {
            sx: 0.0,
            sy: (vh - sh) / 2.0,
            sw: vw,
            sh,
        }
    }
}

/// Crop `frame` to `rect` and scale it into a `width`×`height` luma buffer.
pub fn rasterize(frame: &RgbImage, rect: CropRect, width: u32, height: u32) -> GrayImage {
    let (fw, fh) = frame.dimensions();
    if fw == 0 || fh == 0 {
        return GrayImage::new(width, height);
    }
    let x = (rect.sx.round().max(0.0) as u32).min(fw.saturating_sub(1));
    let y = (rect.sy.round().max(0.0) as u32).min(fh.saturating_sub(1));
    let w = (rect.sw.round() as u32).clamp(1, fw - x);
    let h = (rect.sh.round() as u32).clamp(1, fh - y);

    let region = imageops::crop_imm(frame, x, y, w, h).to_image();
    let scaled = imageops::resize(&region, width, height, imageops::FilterType::Triangle);
    imageops::grayscale(&scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn landscape_video_on_square_surface_cuts_sides() {
        let rect = crop_rect(1920, 1080, 320, 320);
        assert_eq!(
            rect,
            CropRect {
                sx: 420.0,
                sy: 0.0,
                sw: 1080.0,
                sh: 1080.0,
            }
        );
    }

    #[test]
    fn portrait_video_on_wide_surface_cuts_top_and_bottom() {
        let rect = crop_rect(720, 1280, 640, 320);
        assert_eq!(rect.sx, 0.0);
        assert_eq!(rect.sw, 720.0);
        assert_eq!(rect.sh, 360.0);
        assert_eq!(rect.sy, 460.0);
    }

    #[test]
    fn matching_ratio_keeps_full_frame() {
        let rect = crop_rect(1280, 640, 640, 320);
        assert_eq!(
            rect,
            CropRect {
                sx: 0.0,
                sy: 0.0,
                sw: 1280.0,
                sh: 640.0,
            }
        );
    }

    #[test]
    fn degenerate_display_falls_back_to_full_frame() {
        let rect = crop_rect(800, 600, 0, 0);
        assert_eq!(rect.sw, 800.0);
        assert_eq!(rect.sh, 600.0);
    }

    #[test]
    fn rasterize_produces_fixed_buffer_from_cropped_region() {
        // Left half black, right half white; crop the right quarter only.
        let frame = RgbImage::from_fn(400, 100, |x, _| {
            if x < 200 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let rect = CropRect {
            sx: 300.0,
            sy: 0.0,
            sw: 100.0,
            sh: 100.0,
        };
        let buffer = rasterize(&frame, rect, 640, 320);
        assert_eq!(buffer.dimensions(), (640, 320));
        assert!(buffer.pixels().all(|p| p.0[0] > 250));
    }
}
