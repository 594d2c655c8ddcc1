use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::decoder::DecoderAdapter;
use crate::error::{ScanError, ScanResult};
use crate::events::{EventBus, ScanEvent};
use crate::processor::{ScanProcessor, ScanSession};
use crate::sampler::{sampling_loop, SamplerConfig, SamplerContext};

use super::camera::{Camera, FacingMode};
use super::surface::SurfaceHandle;

pub fn unsupported_reason(decoder: &DecoderAdapter) -> String {
    format!("{} decoding is not available", decoder.symbology())
}

struct ActiveSampler {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns the camera lifecycle: acquire, bind, arm the sampler, and the reverse.
#[derive(Clone)]
pub struct CaptureController {
    camera: Arc<dyn Camera>,
    decoder: DecoderAdapter,
    processor: ScanProcessor,
    session: ScanSession,
    surface: SurfaceHandle,
    events: EventBus,
    sampler_config: SamplerConfig,
    facing: FacingMode,
    playing_timeout: Duration,
    active: Arc<Mutex<Option<ActiveSampler>>>,
}

impl CaptureController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera: Arc<dyn Camera>,
        decoder: DecoderAdapter,
        processor: ScanProcessor,
        session: ScanSession,
        surface: SurfaceHandle,
        events: EventBus,
        sampler_config: SamplerConfig,
        facing: FacingMode,
        playing_timeout: Duration,
    ) -> Self {
        Self {
            camera,
            decoder,
            processor,
            session,
            surface,
            events,
            sampler_config,
            facing,
            playing_timeout,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn decoder(&self) -> &DecoderAdapter {
        &self.decoder
    }

    pub async fn is_scanning(&self) -> bool {
        self.session.is_scanning().await
    }

    /// Acquire the camera, wait for playback and arm the sampler. Any failure
    /// leaves the session idle with no stream held.
    pub async fn start(&self) -> ScanResult<()> {
        let mut active = self.active.lock().await;
        if active.is_some() || self.session.is_scanning().await {
            return Err(ScanError::AlreadyScanning);
        }

        // The blocking notice is raised once at startup, not on every attempt.
        if !self.decoder.is_supported() {
            let reason = unsupported_reason(&self.decoder);
            warn!("Cannot start scanning: {reason}");
            return Err(ScanError::UnsupportedPlatform(reason));
        }

        if let Err(reason) = self.acquire_stream().await {
            warn!("Camera unavailable: {reason}");
            self.events.emit(ScanEvent::DeviceUnavailable {
                reason: reason.clone(),
            });
            return Err(ScanError::DeviceUnavailable(reason));
        }

        let generation = self.session.lock().await.begin();
        info!("Scanning session {generation} started ({} camera)", self.facing);
        self.events.emit(ScanEvent::ScanningStateChanged(true));

        let cancel_token = CancellationToken::new();
        let ctx = SamplerContext {
            surface: self.surface.clone(),
            decoder: self.decoder.clone(),
            processor: self.processor.clone(),
            session: self.session.clone(),
            config: self.sampler_config,
        };
        let handle = tokio::spawn(sampling_loop(ctx, generation, cancel_token.clone()));

        *active = Some(ActiveSampler {
            handle,
            cancel_token,
        });
        Ok(())
    }

    /// Open, bind and play. On failure the surface is reset so no track
    /// stays live.
    async fn acquire_stream(&self) -> Result<(), String> {
        let camera = self.camera.clone();
        let surface = self.surface.clone();
        let facing = self.facing;
        let timeout = self.playing_timeout;

        let outcome = tokio::task::spawn_blocking(move || {
            let stream = camera.open(facing)?;
            let mut surface = surface.lock();
            surface.bind(stream);
            if let Err(err) = surface.play(timeout) {
                surface.reset();
                return Err(err);
            }
            Ok::<(), anyhow::Error>(())
        })
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(format!("{err:#}")),
            Err(join_err) => {
                self.surface.lock().reset();
                Err(format!("camera worker failed: {join_err}"))
            }
        }
    }

    /// Disarm the sampler, release the stream and return to idle. Calling it
    /// while idle does nothing.
    pub async fn stop(&self) -> ScanResult<()> {
        let mut active = self.active.lock().await;
        let Some(sampler) = active.take() else {
            return Ok(());
        };

        sampler.cancel_token.cancel();
        // Waits for any payload already being processed.
        self.session.lock().await.end();

        let surface = self.surface.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || surface.lock().reset()).await {
            warn!("Surface reset worker failed: {err}");
        }

        if let Err(err) = sampler.handle.await {
            warn!("Sampling loop task failed to join: {err}");
        }

        info!("Scanning stopped");
        self.events.emit(ScanEvent::ScanningStateChanged(false));
        Ok(())
    }
}
