//! Payload validation, duplicate suppression and persistence of accepted
//! scans.

use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};

use crate::aggregate::Aggregator;
use crate::db::{models::IDENTIFIER_LEN, Database, Identifier, ScanRecord};
use crate::decoder::Symbology;
use crate::error::{ScanError, ScanResult};
use crate::events::{EventBus, ScanEvent};
use crate::feedback::Feedback;

/// Guard character on each side of the identifier.
const PAYLOAD_LEN: usize = IDENTIFIER_LEN + 2;

/// True iff `payload` is one `A`-`D` guard, six ASCII digits, one `A`-`D` guard.
pub fn is_valid_payload(payload: &str) -> bool {
    parse_payload(payload).is_some()
}

/// Identifier carried by a valid payload.
pub fn parse_payload(payload: &str) -> Option<Identifier> {
    let bytes = payload.as_bytes();
    if bytes.len() != PAYLOAD_LEN {
        return None;
    }
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    if !is_guard(first) || !is_guard(last) {
        return None;
    }
    payload[1..payload.len() - 1].parse().ok()
}

fn is_guard(b: u8) -> bool {
    matches!(b, b'A'..=b'D')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Idle,
    Scanning,
}

/// Transient per-app state shared by the capture controller, every sampling
/// tick and the clear operation.
#[derive(Debug)]
pub struct SessionState {
    pub status: SessionStatus,
    /// Bumped on every start; a sampling loop only acts while its own
    /// generation is current.
    pub generation: u64,
    pub last_accepted_payload: String,
    /// Last payload that failed the grammar; repeats of it stay silent.
    pub last_rejected_payload: String,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Idle,
            generation: 0,
            last_accepted_payload: String::new(),
            last_rejected_payload: String::new(),
        }
    }
}

impl SessionState {
    pub fn is_live(&self, generation: u64) -> bool {
        self.status == SessionStatus::Scanning && self.generation == generation
    }

    pub fn begin(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.status = SessionStatus::Scanning;
        self.generation
    }

    pub fn end(&mut self) {
        self.status = SessionStatus::Idle;
        self.forget_payloads();
    }

    pub fn forget_payloads(&mut self) {
        self.last_accepted_payload.clear();
        self.last_rejected_payload.clear();
    }
}

#[derive(Clone, Default)]
pub struct ScanSession {
    state: Arc<Mutex<SessionState>>,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    pub async fn is_scanning(&self) -> bool {
        self.state.lock().await.status == SessionStatus::Scanning
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Accepted(ScanRecord),
    /// Same raw payload as the last accepted one.
    Suppressed,
    Invalid,
    /// Arrived after the session it was sampled in had stopped.
    Dropped,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedbackDurations {
    pub beep_ms: u64,
    pub vibrate_ms: u64,
}

#[derive(Clone)]
pub struct ScanProcessor {
    db: Database,
    aggregator: Aggregator,
    events: EventBus,
    feedback: Arc<dyn Feedback>,
    durations: FeedbackDurations,
    symbology: Symbology,
}

impl ScanProcessor {
    pub fn new(
        db: Database,
        aggregator: Aggregator,
        events: EventBus,
        feedback: Arc<dyn Feedback>,
        durations: FeedbackDurations,
        symbology: Symbology,
    ) -> Self {
        Self {
            db,
            aggregator,
            events,
            feedback,
            durations,
            symbology,
        }
    }

    /// Handle one decoded payload sampled during session `generation`.
    ///
    /// The session lock is held for the whole call, so payloads and clears
    /// are applied one at a time and the duplicate check always sees the
    /// latest accepted payload.
    pub async fn process(
        &self,
        session: &ScanSession,
        generation: u64,
        payload: &str,
    ) -> ScanResult<ScanOutcome> {
        let mut state = session.lock().await;

        if !state.is_live(generation) {
            info!("Dropping payload decoded after session {generation} stopped");
            return Ok(ScanOutcome::Dropped);
        }

        if payload != state.last_rejected_payload {
            state.last_rejected_payload.clear();
        }

        if payload == state.last_accepted_payload {
            return Ok(ScanOutcome::Suppressed);
        }

        let Some(identifier) = parse_payload(payload) else {
            if payload == state.last_rejected_payload {
                return Ok(ScanOutcome::Invalid);
            }
            state.last_rejected_payload = payload.to_string();
            let err = ScanError::InvalidCode {
                payload: payload.to_string(),
                symbology: self.symbology,
            };
            warn!("{err}");
            self.events.emit(ScanEvent::InvalidCode {
                payload: payload.to_string(),
            });
            return Ok(ScanOutcome::Invalid);
        };

        let record = ScanRecord::captured_now(identifier);
        let stored = match self.db.put_scan(&record).await {
            Ok(stored) => stored,
            Err(err) => {
                error!("Scan {} not accepted: {err:#}", record.identifier);
                self.events.emit(ScanEvent::StoreError {
                    message: format!("{err:#}"),
                });
                return Err(ScanError::store(err));
            }
        };

        info!(
            "Accepted scan {} at {}",
            stored.identifier,
            stored.captured_at_text()
        );
        self.events.emit(ScanEvent::ScanAccepted(stored.clone()));
        self.feedback.beep(self.durations.beep_ms);
        self.feedback.vibrate(self.durations.vibrate_ms);

        state.last_accepted_payload = payload.to_string();

        // Failure is already published as the empty aggregate.
        let _ = self.aggregator.recompute_aggregate().await;

        Ok(ScanOutcome::Accepted(stored))
    }

    /// Erase every record and forget the last accepted payload. Callers are
    /// responsible for having obtained the operator's confirmation.
    pub async fn clear_all(&self, session: &ScanSession) -> ScanResult<()> {
        let mut state = session.lock().await;

        match self.db.clear_scans().await {
            Ok(removed) => info!("Cleared {removed} scan records"),
            Err(err) => {
                error!("Clear failed: {err:#}");
                self.events.emit(ScanEvent::StoreError {
                    message: format!("{err:#}"),
                });
                return Err(ScanError::store(err));
            }
        }

        state.forget_payloads();
        self.aggregator.recompute_display().await?;
        Ok(())
    }
}
