//! Bytedesk - content console for the Bytes collections
//!
//! A desktop editor for structured entries with Markdown and LaTeX fields
//! that preview as you type.

mod app;
mod core;
mod engine;
mod field;
mod ui;

use std::sync::Arc;

use anyhow::Context;
use app::BytedeskApp;
use crate::core::config::AppConfig;
use eframe::egui;
use engine::{EngineHandle, SymbolTableLoader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting Bytedesk...");

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!("Using default config: {}", e);
        AppConfig::default()
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()
        .context("Failed to start async runtime")?;
    let handle = runtime.handle().clone();

    let engine = EngineHandle::new(Arc::new(SymbolTableLoader::from_config(&config.engine)));

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Bytedesk"),
        ..Default::default()
    };

    eframe::run_native(
        "Bytedesk",
        native_options,
        Box::new(move |cc| Ok(Box::new(BytedeskApp::new(cc, config, engine, handle)))),
    )
    .map_err(|e| anyhow::anyhow!("UI error: {}", e))?;

    runtime.shutdown_background();
    Ok(())
}
