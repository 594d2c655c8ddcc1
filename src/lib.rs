pub mod aggregate;
pub mod app;
pub mod capture;
pub mod console;
pub mod db;
pub mod decoder;
pub mod error;
pub mod events;
pub mod feedback;
pub mod processor;
pub mod sampler;
pub mod settings;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use app::{Platform, ScannerApp};
use capture::{Camera, NoCamera, ReplayCamera};
use db::Database;
use decoder::CodabarDetector;
use feedback::DeviceFeedback;
use settings::SettingsStore;

const DATA_DIR_ENV: &str = "ROLLSCAN_DATA_DIR";
const DEBUG_ENV: &str = "ROLLSCAN_DEBUG";

fn debug_mode() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn data_dir() -> Result<PathBuf> {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Ok(std::env::current_dir()
            .context("cannot resolve working directory")?
            .join("rollscan-data")),
    }
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let level = if debug_mode() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    log::info!("rollscan starting up...");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async {
        let data_dir = data_dir()?;
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("cannot create data directory {}", data_dir.display()))?;

        let database = Database::new(data_dir.join("rollscan.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?.current();

        let camera: Arc<dyn Camera> = match &settings.frames_dir {
            Some(dir) => Arc::new(ReplayCamera::new(dir)),
            None => {
                log::warn!("No frames directory configured; scanning will report no camera");
                Arc::new(NoCamera)
            }
        };

        let app = Arc::new(ScannerApp::new(
            database,
            Platform {
                camera,
                detector: Arc::new(CodabarDetector::new()),
                feedback: Arc::new(DeviceFeedback::new(settings.tone_hz, settings.tone_gain)),
            },
            &settings,
        ));

        console::run_console(app).await
    })
}
