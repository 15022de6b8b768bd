use std::path::PathBuf;

use clap::{ArgAction, Parser};
use player_core::SearchFilter;
use player_core::queue::MAX_BUFFER_SECONDS;

#[derive(Parser, Debug)]
#[command(name = "tunedeck", version, about = "Search and play music from the terminal")]
pub(crate) struct Args {
    /// Initial search query.
    pub(crate) query: Option<String>,

    /// ytmusicapi OAuth token file.
    #[arg(long, env = "OAUTH_FILE")]
    pub(crate) oauth_file: Option<PathBuf>,

    /// Brand account id to search as.
    #[arg(long, env = "BRAND_ID")]
    pub(crate) brand_id: Option<String>,

    /// Where downloaded media is cached. Defaults to the user cache dir.
    #[arg(long, env = "CACHE_DIR")]
    pub(crate) cache_dir: Option<PathBuf>,

    /// Python interpreter with `ytmusicapi` installed.
    #[arg(long, env = "PYTHON", default_value = "python3")]
    pub(crate) python: String,

    /// Downloader executable (yt-dlp compatible).
    #[arg(long, env = "DOWNLOADER", default_value = "yt-dlp")]
    pub(crate) downloader: String,

    /// Result type to search for.
    #[arg(long, default_value_t = SearchFilter::Songs)]
    pub(crate) filter: SearchFilter,

    /// Output device (substring match).
    #[arg(long)]
    pub(crate) device: Option<String>,

    /// List output devices and exit.
    #[arg(long)]
    pub(crate) list_devices: bool,

    /// Decoded audio buffered ahead of the output, in seconds (0 < s <= 10).
    #[arg(long, default_value_t = 1.0, value_parser = parse_buffer_seconds)]
    pub(crate) buffer_seconds: f32,

    /// Initial volume, 0-100.
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub(crate) volume: u8,

    /// Forward tracing output to the log pane.
    #[arg(long, env = "LOGGING", default_value_t = true, action = ArgAction::Set)]
    pub(crate) logging: bool,
}

fn parse_buffer_seconds(s: &str) -> Result<f32, String> {
    let secs: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if secs.is_finite() && secs > 0.0 && secs <= MAX_BUFFER_SECONDS {
        Ok(secs)
    } else {
        Err(format!("must be greater than 0 and at most {MAX_BUFFER_SECONDS}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["tunedeck"]).unwrap();
        assert_eq!(args.filter, SearchFilter::Songs);
        assert_eq!(args.volume, 50);
        assert_eq!(args.python, "python3");
        assert!(args.query.is_none());
    }

    #[test]
    fn parses_filter_volume_and_logging() {
        let args = Args::try_parse_from([
            "tunedeck",
            "little big",
            "--filter",
            "videos",
            "--volume",
            "80",
            "--logging",
            "false",
        ])
        .unwrap();
        assert_eq!(args.query.as_deref(), Some("little big"));
        assert_eq!(args.filter, SearchFilter::Videos);
        assert_eq!(args.volume, 80);
        assert!(!args.logging);
    }

    #[test]
    fn rejects_out_of_range_volume() {
        assert!(Args::try_parse_from(["tunedeck", "--volume", "150"]).is_err());
    }

    #[test]
    fn buffer_seconds_is_bounded() {
        let args = Args::try_parse_from(["tunedeck", "--buffer-seconds", "2.5"]).unwrap();
        assert_eq!(args.buffer_seconds, 2.5);
        for bad in ["0", "-1", "3600", "1e12", "NaN", "soon"] {
            assert!(
                Args::try_parse_from(["tunedeck", "--buffer-seconds", bad]).is_err(),
                "{bad} accepted"
            );
        }
    }
}
