mod app;
mod config;
mod debounce;
mod history;
mod loader;
mod processing;
mod session;
mod state;
mod surface;

use std::path::PathBuf;

use app::PhotoAdjustApp;
use config::AppConfig;

/// Image paths given on the command line are loaded at startup.
fn startup_paths(args: impl Iterator<Item = String>) -> Vec<PathBuf> {
    args.filter(|a| !a.starts_with('-'))
        .map(PathBuf::from)
        .collect()
}

fn main() -> eframe::Result {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load();
    let paths = startup_paths(std::env::args().skip(1));
    tracing::info!(
        debounce_ms = config.debounce().as_millis() as u64,
        files = paths.len(),
        "starting photoadjust"
    );

    let width = config.window_width.unwrap_or(1280.0);
    let height = config.window_height.unwrap_or(800.0);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Photo Adjust")
            .with_app_id("photoadjust")
            .with_drag_and_drop(true)
            .with_inner_size([width, height]),
        ..Default::default()
    };

    eframe::run_native(
        "photoadjust",
        native_options,
        Box::new(|cc| Ok(Box::new(PhotoAdjustApp::new(cc, config, paths)))),
    )
}
