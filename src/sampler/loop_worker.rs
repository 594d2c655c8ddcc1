use anyhow::{Context, Result};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::capture::SurfaceHandle;
use crate::decoder::DecoderAdapter;
use crate::processor::{ScanOutcome, ScanProcessor, ScanSession};
use crate::{tick_debug, tick_trace, tick_warn};

use super::SamplerConfig;

// Flip to silence per-tick logging entirely.
const TICK_LOGS: bool = true;

/// Grab + decode budget for one tick; a stuck decoder must not stall the loop
/// forever.
const SAMPLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything one sampling loop needs. Cloned into the spawned task.
#[derive(Clone)]
pub struct SamplerContext {
    pub surface: SurfaceHandle,
    pub decoder: DecoderAdapter,
    pub processor: ScanProcessor,
    pub session: ScanSession,
    pub config: SamplerConfig,
}

/// Sample, decode and process on a fixed cadence until `cancel_token` fires.
/// The first tick runs immediately.
pub async fn sampling_loop(ctx: SamplerContext, generation: u64, cancel_token: CancellationToken) {
    let mut ticker = time::interval(ctx.config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                log::info!("sampling loop for session {generation} shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = sample_once(&ctx, generation, &cancel_token).await {
                    tick_warn!("sampling tick failed: {err:#}");
                }
            }
        }
    }
}

async fn sample_once(
    ctx: &SamplerContext,
    generation: u64,
    cancel_token: &CancellationToken,
) -> Result<Option<ScanOutcome>> {
    let started = Instant::now();

    // Only the grab and decode are abandoned on cancel; processing below
    // always runs to completion once started.
    let decoded = tokio::select! {
        _ = cancel_token.cancelled() => return Ok(None),
        decoded = time::timeout(SAMPLE_TIMEOUT, grab_and_decode(ctx)) => decoded,
    };
    let payload = match decoded {
        Ok(result) => result?,
        Err(_) => {
            tick_warn!("sampling tick exceeded {:?}; skipping", SAMPLE_TIMEOUT);
            return Ok(None);
        }
    };

    let Some(payload) = payload else {
        tick_trace!("no code in frame ({}ms)", started.elapsed().as_millis());
        return Ok(None);
    };

    if cancel_token.is_cancelled() {
        tick_debug!("discarding {payload:?}: sampler disarmed while decoding");
        return Ok(None);
    }

    tick_debug!(
        "decoded {payload:?} in {}ms",
        started.elapsed().as_millis()
    );

    match ctx.processor.process(&ctx.session, generation, &payload).await {
        Ok(outcome) => Ok(Some(outcome)),
        // Store failures abort this scan only; the next tick may succeed.
        Err(err) if err.is_recoverable() => {
            tick_warn!("scan not recorded: {err}");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

async fn grab_and_decode(ctx: &SamplerContext) -> Result<Option<String>> {
    let surface = ctx.surface.clone();
    let (width, height) = (ctx.config.buffer_width, ctx.config.buffer_height);

    let buffer = tokio::task::spawn_blocking(move || surface.lock().sample(width, height))
        .await
        .context("frame sampling worker join failed")??;

    match buffer {
        Some(buffer) => ctx.decoder.decode_async(buffer).await,
        None => Ok(None),
    }
}
