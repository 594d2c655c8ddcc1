use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::aggregate::{Aggregator, DisplayState};
use crate::capture::{unsupported_reason, Camera, CaptureController, SurfaceHandle, VideoSurface};
use crate::db::Database;
use crate::decoder::{BarcodeDetector, DecoderAdapter};
use crate::error::{ScanError, ScanResult};
use crate::events::{EventBus, ScanEvent, UiEvent};
use crate::feedback::Feedback;
use crate::processor::{ScanProcessor, ScanSession};
use crate::settings::ScannerSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum View {
    Home,
    Scan,
}

/// Collaborators the app is assembled from. The camera, detector and
/// feedback sink are platform specific.
pub struct Platform {
    pub camera: Arc<dyn Camera>,
    pub detector: Arc<dyn BarcodeDetector>,
    pub feedback: Arc<dyn Feedback>,
}

pub struct ScannerApp {
    db: Database,
    events: EventBus,
    aggregator: Aggregator,
    processor: ScanProcessor,
    capture: CaptureController,
    view: Mutex<View>,
}

impl ScannerApp {
    pub fn new(db: Database, platform: Platform, settings: &ScannerSettings) -> Self {
        let events = EventBus::new();
        let aggregator = Aggregator::new(db.clone(), events.clone());
        let processor = ScanProcessor::new(
            db.clone(),
            aggregator.clone(),
            events.clone(),
            platform.feedback,
            settings.feedback_durations(),
            settings.symbology,
        );
        let decoder = DecoderAdapter::new(platform.detector, settings.symbology);
        let surface = SurfaceHandle::new(VideoSurface::new(
            settings.surface_width,
            settings.surface_height,
        ));
        let capture = CaptureController::new(
            platform.camera,
            decoder,
            processor.clone(),
            ScanSession::new(),
            surface,
            events.clone(),
            settings.sampler_config(),
            settings.facing,
            settings.playing_timeout(),
        );

        Self {
            db,
            events,
            aggregator,
            processor,
            capture,
            view: Mutex::new(View::Home),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    pub async fn view(&self) -> View {
        *self.view.lock().await
    }

    pub async fn is_scanning(&self) -> bool {
        self.capture.is_scanning().await
    }

    /// Home view on launch: recent activity, then the aggregate and listing.
    /// A missing decoder is reported once here; records stay viewable.
    pub async fn startup(&self) -> ScanResult<Vec<String>> {
        if !self.capture.decoder().is_supported() {
            let reason = unsupported_reason(self.capture.decoder());
            warn!("Scanning unavailable: {reason}");
            self.events.emit(ScanEvent::Unsupported { reason });
        }

        // Publish the display, fail-closed included, before reporting a read error.
        let recent = self.aggregator.recent_activity().await;
        self.aggregator.recompute_display().await?;
        let recent = recent?;
        info!("Loaded {} stored scans", recent.len());
        Ok(recent)
    }

    pub async fn handle_ui_event(&self, event: UiEvent) -> ScanResult<()> {
        info!("UI event {event:?}");
        match event {
            UiEvent::ScanStart => self.capture.start().await,
            UiEvent::ScanStop => self.capture.stop().await,
            UiEvent::ScanToggle => {
                if self.capture.is_scanning().await {
                    self.capture.stop().await
                } else {
                    self.capture.start().await
                }
            }
            UiEvent::ClearRequested { confirmed } => {
                if !confirmed {
                    info!("Clear cancelled by operator");
                    return Ok(());
                }
                self.processor.clear_all(self.capture.session()).await
            }
            UiEvent::NavigateBack => self.navigate_back().await.map(|_| ()),
            UiEvent::EnterScanView => {
                *self.view.lock().await = View::Scan;
                self.events.emit(ScanEvent::ListChanged(Vec::new()));
                self.aggregator.recompute_aggregate().await.map(|_| ())
            }
        }
    }

    async fn navigate_back(&self) -> ScanResult<DisplayState> {
        if self.capture.is_scanning().await {
            return Err(ScanError::NavigationLocked);
        }
        *self.view.lock().await = View::Home;
        self.aggregator.recompute_display().await
    }

    /// Release the camera before exit.
    pub async fn shutdown(&self) {
        if let Err(err) = self.capture.stop().await {
            warn!("Failed to stop scanning on shutdown: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::NoCamera;
    use crate::decoder::CodabarDetector;
    use crate::feedback::SilentFeedback;

    fn app() -> ScannerApp {
        ScannerApp::new(
            Database::open_in_memory().unwrap(),
            Platform {
                camera: Arc::new(NoCamera),
                detector: Arc::new(CodabarDetector::default()),
                feedback: Arc::new(SilentFeedback),
            },
            &ScannerSettings::default(),
        )
    }

    fn drain(rx: &mut broadcast::Receiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn startup_on_empty_store_publishes_zero_aggregate() {
        let app = app();
        let mut rx = app.subscribe();

        assert!(app.startup().await.unwrap().is_empty());
        let events = drain(&mut rx);
        assert!(events.contains(&ScanEvent::SummaryChanged("registered 0 (total 0)".into())));
        assert!(events.contains(&ScanEvent::ListChanged(Vec::new())));
        assert_eq!(app.view().await, View::Home);
    }

    #[tokio::test]
    async fn startup_on_unreadable_store_publishes_empty_state() {
        let app = app();
        app.database()
            .execute(|conn| Ok(conn.execute_batch("DROP TABLE scans")?))
            .await
            .unwrap();
        let mut rx = app.subscribe();

        let err = app.startup().await.unwrap_err();
        assert!(matches!(err, ScanError::StoreIo(_)));
        let events = drain(&mut rx);
        assert!(events.contains(&ScanEvent::SummaryChanged("registered 0 (total 0)".into())));
        assert!(events.contains(&ScanEvent::ListChanged(Vec::new())));
        assert!(events
            .iter()
            .any(|e| matches!(e, ScanEvent::StoreError { .. })));
    }

    #[tokio::test]
    async fn view_switches_follow_ui_events() {
        let app = app();
        app.handle_ui_event(UiEvent::EnterScanView).await.unwrap();
        assert_eq!(app.view().await, View::Scan);
        app.handle_ui_event(UiEvent::NavigateBack).await.unwrap();
        assert_eq!(app.view().await, View::Home);
    }

    #[tokio::test]
    async fn unconfirmed_clear_keeps_records() {
        let app = app();
        app.database()
            .put_scan(&crate::db::ScanRecord::captured_now("123456".parse().unwrap()))
            .await
            .unwrap();

        app.handle_ui_event(UiEvent::ClearRequested { confirmed: false })
            .await
            .unwrap();
        assert_eq!(app.database().get_all_scans().await.unwrap().len(), 1);

        app.handle_ui_event(UiEvent::ClearRequested { confirmed: true })
            .await
            .unwrap();
        assert!(app.database().get_all_scans().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_without_camera_stays_idle() {
        let app = app();
        let err = app.handle_ui_event(UiEvent::ScanToggle).await.unwrap_err();
        assert!(matches!(err, ScanError::DeviceUnavailable(_)));
        assert!(!app.is_scanning().await);
    }
}
