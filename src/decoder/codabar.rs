//! Scan-line Codabar detector.
//!
//! Each Codabar character is seven elements (four bars, three spaces), each
//! either narrow or wide, followed by a narrow inter-character gap. A symbol
//! starts and ends with one of `A`-`D`. Rows of the buffer are binarized
//! around their mid-level luma, turned into run lengths and matched against
//! the character table in both reading directions.

use anyhow::{anyhow, bail, Result};
use image::{GrayImage, Luma};

use super::{BarcodeDetector, DetectedCode, Symbology};

const ALPHABET: &[u8; 20] = b"0123456789-$:/.+ABCD";

/// Seven-bit element patterns, first element in the high bit, 1 = wide.
const CHARACTER_ENCODINGS: [u8; 20] = [
    0x03, 0x06, 0x09, 0x60, 0x12, 0x42, 0x21, 0x24, 0x30, 0x48, // 0-9
    0x0c, 0x18, 0x45, 0x51, 0x54, 0x15, // - $ : / . +
    0x1a, 0x29, 0x0b, 0x0e, // A B C D
];

const ELEMENTS_PER_CHAR: usize = 7;
const MIN_CONTRAST: u8 = 48;
/// Start + at least one data character + stop.
const MIN_SYMBOL_CHARS: usize = 3;
/// Fractions of the buffer height probed, centre first.
const ROW_PROBES: [f32; 7] = [0.5, 0.4, 0.6, 0.3, 0.7, 0.2, 0.8];

#[derive(Debug, Clone, Copy)]
struct Run {
    dark: bool,
    width: u32,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CodabarDetector;

impl CodabarDetector {
    pub fn new() -> Self {
        Self
    }

    fn decode_row(&self, row: &[u8]) -> Option<String> {
        let runs = binarize(row)?;
        if let Some(text) = decode_runs(&runs) {
            return Some(text);
        }

        // Symbol presented upside down: right to left restores the printed
        // order, characters and elements alike.
        let reversed: Vec<Run> = runs.iter().rev().copied().collect();
        decode_runs(&reversed)
    }
}

impl BarcodeDetector for CodabarDetector {
    fn supported_formats(&self) -> Vec<Symbology> {
        vec![Symbology::Codabar]
    }

    fn detect(&self, buffer: &GrayImage) -> Result<Vec<DetectedCode>> {
        let (width, height) = buffer.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let mut found: Vec<DetectedCode> = Vec::new();
        let mut row = Vec::with_capacity(width as usize);

        for fraction in ROW_PROBES {
            let y = ((height as f32 * fraction) as u32).min(height - 1);
            row.clear();
            row.extend((0..width).map(|x| buffer.get_pixel(x, y).0[0]));

            if let Some(text) = self.decode_row(&row) {
                if !found.iter().any(|code| code.raw_value == text) {
                    found.push(DetectedCode {
                        format: Symbology::Codabar,
                        raw_value: text,
                    });
                }
            }
        }

        Ok(found)
    }
}

fn binarize(row: &[u8]) -> Option<Vec<Run>> {
    let min = *row.iter().min()?;
    let max = *row.iter().max()?;
    if max - min < MIN_CONTRAST {
        return None;
    }
    let threshold = (u16::from(min) + u16::from(max)) / 2;

    let mut runs: Vec<Run> = Vec::new();
    for &px in row {
        let dark = u16::from(px) < threshold;
        match runs.last_mut() {
            Some(run) if run.dark == dark => run.width += 1,
            _ => runs.push(Run { dark, width: 1 }),
        }
    }
    Some(runs)
}

fn decode_runs(runs: &[Run]) -> Option<String> {
    (0..runs.len())
        .filter(|&start| runs[start].dark)
        .find_map(|start| decode_from(runs, start))
}

fn decode_from(runs: &[Run], start: usize) -> Option<String> {
    let mut text = String::new();
    let mut i = start;

    while i + ELEMENTS_PER_CHAR <= runs.len() {
        let c = classify(&runs[i..i + ELEMENTS_PER_CHAR])?;
        let is_guard = is_start_stop(c);

        if text.is_empty() && !is_guard {
            return None;
        }
        text.push(c);

        if is_guard && text.len() >= MIN_SYMBOL_CHARS {
            return Some(text);
        }
        if is_guard && text.len() > 1 {
            // Start immediately followed by stop carries no data.
            return None;
        }

        // Skip the inter-character gap.
        i += ELEMENTS_PER_CHAR + 1;
    }

    None
}

fn classify(window: &[Run]) -> Option<char> {
    let min = window.iter().map(|run| run.width).min()?;
    let max = window.iter().map(|run| run.width).max()?;
    // Narrow and wide must be distinguishable.
    if max * 2 < min * 3 {
        return None;
    }
    let threshold = min + max;

    let pattern = window.iter().fold(0u8, |acc, run| {
        (acc << 1) | u8::from(run.width * 2 > threshold)
    });

    CHARACTER_ENCODINGS
        .iter()
        .position(|&encoding| encoding == pattern)
        .map(|index| char::from(ALPHABET[index]))
}

fn is_start_stop(c: char) -> bool {
    matches!(c, 'A'..='D')
}

const LIGHT: u8 = 235;
const DARK: u8 = 20;

/// Render `text` as a Codabar symbol centred in a `width`×`height` buffer,
/// bars covering the middle half of the height. Used to print test cards and
/// to build replay fixtures.
pub fn render_symbol(text: &str, narrow: u32, wide: u32, width: u32, height: u32) -> Result<GrayImage> {
    if narrow == 0 || wide <= narrow {
        bail!("wide elements ({wide}px) must be wider than narrow ones ({narrow}px)");
    }

    let mut elements: Vec<(bool, u32)> = Vec::new();
    for (n, c) in text.bytes().enumerate() {
        let index = ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or_else(|| anyhow!("{:?} is not a codabar character", char::from(c)))?;
        let encoding = CHARACTER_ENCODINGS[index];
        if n > 0 {
            elements.push((false, narrow));
        }
        for element in 0..ELEMENTS_PER_CHAR {
            let is_wide = (encoding >> (ELEMENTS_PER_CHAR - 1 - element)) & 1 == 1;
            elements.push((element % 2 == 0, if is_wide { wide } else { narrow }));
        }
    }

    let symbol_width: u32 = elements.iter().map(|(_, w)| w).sum();
    if symbol_width >= width {
        bail!("symbol is {symbol_width}px wide, buffer only {width}px");
    }

    let mut img = GrayImage::from_pixel(width, height, Luma([LIGHT]));
    let mut x = (width - symbol_width) / 2;
    let top = height / 4;
    for (dark, w) in elements {
        if dark {
            for dx in x..x + w {
                for y in top..height - top {
                    img.put_pixel(dx, y, Luma([DARK]));
                }
            }
        }
        x += w;
    }
    Ok(img)
}
