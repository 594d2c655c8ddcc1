use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;

/// Finite mono sine burst used as the "scan accepted" beep.
pub struct Tone {
    freq: f32,
    gain: f32,
    num_sample: usize,
    total_samples: usize,
}

impl Tone {
    pub fn new(freq: f32, gain: f32, duration: Duration) -> Self {
        let total_samples = (duration.as_secs_f32() * SAMPLE_RATE as f32).round() as usize;
        Self {
            freq,
            gain: gain.clamp(0.0, 1.0),
            num_sample: 0,
            total_samples,
        }
    }
}

impl Iterator for Tone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        self.num_sample += 1;
        Some((2.0 * PI * self.freq * t).sin() * self.gain)
    }
}

impl Source for Tone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples as f32 / SAMPLE_RATE as f32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hundred_ms_tone_has_expected_length() {
        let tone = Tone::new(1000.0, 0.1, Duration::from_millis(100));
        assert_eq!(tone.count(), 4410);
    }

    #[test]
    fn samples_stay_within_gain() {
        let tone = Tone::new(1000.0, 0.1, Duration::from_millis(20));
        assert!(tone.into_iter().all(|s| s.abs() <= 0.1 + f32::EPSILON));
    }
}
