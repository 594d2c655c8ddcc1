//! Audible and haptic acknowledgement of accepted scans. Both are
//! fire-and-forget: failures are logged and never reach the pipeline.

pub mod tone;

use log::{debug, warn};
use rodio::{OutputStream, Sink};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;
use std::time::Duration;

use tone::Tone;

/// Side effects emitted exactly once per accepted scan.
pub trait Feedback: Send + Sync + 'static {
    fn beep(&self, duration_ms: u64);
    fn vibrate(&self, duration_ms: u64);
}

enum ToneCommand {
    Play { freq: f32, gain: f32, duration: Duration },
}

/// Owns a dedicated audio thread; rodio output streams are not `Send`.
pub struct ToneEngineHandle {
    tx: Mutex<Option<Sender<ToneCommand>>>,
    freq: f32,
    gain: f32,
    unavailable: AtomicBool,
}

impl ToneEngineHandle {
    pub fn new(freq: f32, gain: f32) -> Self {
        Self {
            tx: Mutex::new(None),
            freq,
            gain,
            unavailable: AtomicBool::new(false),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<ToneCommand>, String> {
        let mut guard = match self.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<ToneCommand>();

        thread::Builder::new()
            .name("tone-engine".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        ToneCommand::Play {
                            freq,
                            gain,
                            duration,
                        } => {
                            if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                warn!("Beep skipped: {err}");
                                continue;
                            }
                            if let Some(ref s) = sink {
                                s.append(Tone::new(freq, gain, duration));
                            }
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    pub fn play(&self, duration: Duration) {
        if self.unavailable.load(Ordering::Relaxed) {
            return;
        }
        let sent = self.ensure_thread().and_then(|tx| {
            tx.send(ToneCommand::Play {
                freq: self.freq,
                gain: self.gain,
                duration,
            })
            .map_err(|e| e.to_string())
        });
        if let Err(err) = sent {
            warn!("Tone engine unavailable, disabling beeps: {err}");
            self.unavailable.store(true, Ordering::Relaxed);
        }
    }
}

/// Feedback on the local device: rodio tone plus a haptic pulse. Desktop
/// hosts have no vibration motor, so the pulse is only logged.
pub struct DeviceFeedback {
    tone: ToneEngineHandle,
}

impl DeviceFeedback {
    pub fn new(tone_hz: f32, tone_gain: f32) -> Self {
        Self {
            tone: ToneEngineHandle::new(tone_hz, tone_gain),
        }
    }
}

impl Feedback for DeviceFeedback {
    fn beep(&self, duration_ms: u64) {
        self.tone.play(Duration::from_millis(duration_ms));
    }

    fn vibrate(&self, duration_ms: u64) {
        debug!("haptic pulse {duration_ms}ms");
    }
}

/// Feedback that does nothing, for headless runs.
pub struct SilentFeedback;

impl Feedback for SilentFeedback {
    fn beep(&self, _duration_ms: u64) {}
    fn vibrate(&self, _duration_ms: u64) {}
}
