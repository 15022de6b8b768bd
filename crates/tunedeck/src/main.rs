//! `tunedeck`: search a music catalog and play results from the terminal.
//!
//! Features:
//! - search with a result-type filter; results list title and artists/duration
//! - Enter: download (once, cached) and play the selected track
//! - Space: play/pause, s: stop
//! - progress bar, volume and mute, log pane

mod catalog;
mod cli;
mod config;
mod fetch;
mod logging;
mod ui;
mod worker;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::unbounded;
use player_core::device;
use player_core::volume::VolumeState;

use crate::catalog::ScriptCatalog;
use crate::cli::Args;
use crate::config::AppConfig;
use crate::fetch::CachedFetcher;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Before any thread exists, so the log clock can read the local offset.
    let (log_tx, log_rx) = unbounded::<String>();
    if args.logging && !args.list_devices {
        logging::init(log_tx)?;
    }

    let host = cpal::default_host();
    if args.list_devices {
        for name in device::output_device_names(&host)? {
            println!("{name}");
        }
        return Ok(());
    }

    let config = AppConfig::from_args(&args)?;
    tracing::info!(cache_dir = %config.cache_dir.display(), "starting tunedeck");

    let device = device::pick_device(&host, args.device.as_deref())?;
    let volume = Arc::new(VolumeState::new(args.volume));
    let fetcher = CachedFetcher::new(config.cache_dir.clone(), &config.downloader)?;
    let catalog = Arc::new(ScriptCatalog::new(
        config.python.clone(),
        config.oauth_file.clone(),
        config.brand_id.clone(),
    ));

    let player = worker::spawn_player(device, fetcher, volume.clone(), config.playback.clone())?;
    ui::run_tui(catalog, player, volume, args.query, args.filter, log_rx)
}
