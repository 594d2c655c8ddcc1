//! Events exchanged with the UI collaborator.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::aggregate::Aggregate;
use crate::db::ScanRecord;

const EVENT_CAPACITY: usize = 256;

/// Inputs the UI sends in response to operator actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiEvent {
    ScanStart,
    ScanStop,
    /// Start when idle, stop when scanning.
    ScanToggle,
    /// `confirmed` carries the outcome of the operator's confirmation prompt.
    ClearRequested { confirmed: bool },
    NavigateBack,
    EnterScanView,
}

/// Outputs produced for the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ScanEvent {
    ScanningStateChanged(bool),
    ScanAccepted(ScanRecord),
    InvalidCode { payload: String },
    AggregateChanged(Aggregate),
    /// Header line, e.g. `registered 3 (total 5)`.
    SummaryChanged(String),
    ListChanged(Vec<String>),
    /// Blocking notice: scanning is unavailable on this platform.
    Unsupported { reason: String },
    DeviceUnavailable { reason: String },
    StoreError { message: String },
}

impl ScanEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ScanEvent::ScanningStateChanged(_) => "scanning-state-changed",
            ScanEvent::ScanAccepted(_) => "scan-accepted",
            ScanEvent::InvalidCode { .. } => "invalid-code",
            ScanEvent::AggregateChanged(_) => "aggregate-changed",
            ScanEvent::SummaryChanged(_) => "summary-changed",
            ScanEvent::ListChanged(_) => "list-changed",
            ScanEvent::Unsupported { .. } => "unsupported",
            ScanEvent::DeviceUnavailable { .. } => "device-unavailable",
            ScanEvent::StoreError { .. } => "store-error",
        }
    }
}

/// Fan-out of [`ScanEvent`]s. Emitting never blocks and never fails the
/// pipeline; events sent while nobody listens are dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ScanEvent) {
        log::trace!("emit {}", event.name());
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_events_deserialize_from_kebab_case() {
        let event: UiEvent = serde_json::from_str(r#"{"type":"scan-start"}"#).unwrap();
        assert_eq!(event, UiEvent::ScanStart);

        let event: UiEvent =
            serde_json::from_str(r#"{"type":"clear-requested","confirmed":true}"#).unwrap();
        assert_eq!(event, UiEvent::ClearRequested { confirmed: true });
    }

    #[test]
    fn scan_events_serialize_with_tag() {
        let json = serde_json::to_value(ScanEvent::ScanningStateChanged(true)).unwrap();
        assert_eq!(json["event"], "scanningStateChanged");
        assert_eq!(json["payload"], true);
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(ScanEvent::ListChanged(vec!["000001: 2024-01-01T00:00:00".into()]));
        assert_eq!(
            rx.recv().await.unwrap(),
            ScanEvent::ListChanged(vec!["000001: 2024-01-01T00:00:00".into()])
        );
    }

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        EventBus::new().emit(ScanEvent::ScanningStateChanged(false));
    }
}
