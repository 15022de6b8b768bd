use std::path::PathBuf;

use anyhow::{Result, anyhow};
use player_core::PlaybackConfig;

use crate::cli::Args;

/// Settings resolved from arguments, environment and platform defaults.
#[derive(Clone, Debug)]
pub(crate) struct AppConfig {
    pub(crate) cache_dir: PathBuf,
    pub(crate) oauth_file: Option<PathBuf>,
    pub(crate) brand_id: Option<String>,
    pub(crate) python: String,
    pub(crate) downloader: String,
    pub(crate) playback: PlaybackConfig,
}

impl AppConfig {
    pub(crate) fn from_args(args: &Args) -> Result<Self> {
        let cache_dir = match &args.cache_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .map(|d| d.join("tunedeck"))
                .ok_or_else(|| anyhow!("no user cache directory; pass --cache-dir"))?,
        };

        Ok(Self {
            cache_dir,
            oauth_file: args.oauth_file.clone(),
            brand_id: args.brand_id.clone().filter(|b| !b.trim().is_empty()),
            python: args.python.clone(),
            downloader: args.downloader.clone(),
            playback: PlaybackConfig {
                buffer_seconds: args.buffer_seconds,
                ..PlaybackConfig::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn explicit_cache_dir_wins() {
        let args = Args::try_parse_from([
            "tunedeck",
            "--cache-dir",
            "/tmp/td-cache",
            "--brand-id",
            " ",
            "--buffer-seconds",
            "2.5",
        ])
        .unwrap();
        let cfg = AppConfig::from_args(&args).unwrap();
        assert_eq!(cfg.cache_dir, PathBuf::from("/tmp/td-cache"));
        assert!(cfg.brand_id.is_none());
        assert_eq!(cfg.playback.buffer_seconds, 2.5);
        assert_eq!(cfg.playback.error_channel_capacity, 50);
    }
}
