//! Download-once media cache.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use player_core::MediaFetcher;

const MEDIA_EXT: &str = "mp4";
/// Every alternative must already be an MP4 container; the file is saved as `.mp4`
/// without remuxing.
const FORMAT_SELECTOR: &str = "bestaudio[ext=m4a]/best[ext=mp4]";
const WATCH_URL: &str = "https://music.youtube.com/watch?v=";

/// Resolves track ids to `<cache_dir>/<id>.mp4`, downloading on a miss.
pub(crate) struct CachedFetcher {
    cache_dir: PathBuf,
    downloader: String,
    downloader_args: Vec<String>,
}

impl CachedFetcher {
    /// `downloader` is a command line such as `yt-dlp` or `python3 -m yt_dlp`.
    pub(crate) fn new(cache_dir: PathBuf, downloader: &str) -> Result<Self> {
        let mut words = downloader.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| anyhow!("empty downloader command"))?;
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("create cache dir {}", cache_dir.display()))?;
        Ok(Self {
            cache_dir,
            downloader: program,
            downloader_args: words.collect(),
        })
    }

    fn media_path(&self, track_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{track_id}.{MEDIA_EXT}"))
    }

    fn download(&self, track_id: &str, dest: &Path) -> Result<()> {
        let partial = dest.with_extension(format!("{MEDIA_EXT}.part"));
        let _ = fs::remove_file(&partial);

        tracing::info!(id = track_id, downloader = %self.downloader, "downloading");
        let output = Command::new(&self.downloader)
            .args(&self.downloader_args)
            .args(["--quiet", "--no-playlist", "--force-overwrites"])
            .args(["-f", FORMAT_SELECTOR])
            .arg("-o")
            .arg(&partial)
            .arg(format!("{WATCH_URL}{track_id}"))
            .output()
            .with_context(|| format!("run {}", self.downloader))?;

        if !output.status.success() {
            let _ = fs::remove_file(&partial);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().last().unwrap_or("no output").trim();
            bail!("{} exited with {}: {last}", self.downloader, output.status);
        }
        if !is_nonempty_file(&partial) {
            bail!("{} produced no file for {track_id}", self.downloader);
        }

        fs::rename(&partial, dest)
            .with_context(|| format!("move download into {}", dest.display()))?;
        Ok(())
    }
}

impl MediaFetcher for CachedFetcher {
    fn ensure_local(&self, track_id: &str) -> Result<PathBuf> {
        validate_id(track_id)?;
        let path = self.media_path(track_id);
        if is_nonempty_file(&path) {
            tracing::debug!(id = track_id, path = %path.display(), "cache hit");
            return Ok(path);
        }
        self.download(track_id, &path)?;
        tracing::info!(id = track_id, path = %path.display(), "cached");
        Ok(path)
    }
}

/// Track ids become file names; only allow the URL-safe alphabet ids use.
fn validate_id(track_id: &str) -> Result<()> {
    let ok = !track_id.is_empty()
        && track_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(anyhow!("invalid track id {track_id:?}"))
    }
}

fn is_nonempty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}
