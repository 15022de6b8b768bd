//! Catalog search through `ytmusicapi`, run as an external Python process.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use player_core::{CatalogSource, SearchFilter, Track};
use serde::Deserialize;

/// Reads `auth brand query filter limit` from argv and prints the raw results as JSON.
const SEARCH_SCRIPT: &str = r#"
import json, sys
from ytmusicapi import YTMusic
auth, brand, query, filt, limit = sys.argv[1:6]
yt = YTMusic(auth or None, brand or None)
print(json.dumps(yt.search(query, filter=filt, limit=int(limit))))
"#;

const RESULT_LIMIT: u32 = 40;

pub(crate) struct ScriptCatalog {
    python: String,
    oauth_file: Option<PathBuf>,
    brand_id: Option<String>,
}

impl ScriptCatalog {
    pub(crate) fn new(python: String, oauth_file: Option<PathBuf>, brand_id: Option<String>) -> Self {
        Self {
            python,
            oauth_file,
            brand_id,
        }
    }
}

impl CatalogSource for ScriptCatalog {
    fn search(&self, query: &str, filter: SearchFilter) -> Result<Vec<Track>> {
        let auth = self
            .oauth_file
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(query, %filter, "catalog search");
        let output = Command::new(&self.python)
            .arg("-c")
            .arg(SEARCH_SCRIPT)
            .arg(auth)
            .arg(self.brand_id.as_deref().unwrap_or(""))
            .arg(query)
            .arg(filter.as_str())
            .arg(RESULT_LIMIT.to_string())
            .output()
            .with_context(|| format!("run {}", self.python))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().last().unwrap_or("no output").trim();
            return Err(anyhow!("search script failed ({}): {last}", output.status));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let tracks = parse_search_output(&stdout)?;
        tracing::info!(query, results = tracks.len(), "catalog search finished");
        Ok(tracks)
    }
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
    title: Option<String>,
    artists: Option<Vec<ArtistRef>>,
    duration: Option<String>,
    duration_seconds: Option<u64>,
}

#[derive(Deserialize)]
struct ArtistRef {
    name: String,
}

/// Keep the playable entries (those with a video id) in result order.
fn parse_search_output(json: &str) -> Result<Vec<Track>> {
    let results: Vec<SearchResult> =
        serde_json::from_str(json.trim()).context("parse search results")?;

    Ok(results
        .into_iter()
        .filter_map(|r| {
            let id = r.video_id.filter(|id| !id.is_empty())?;
            let duration_secs = r
                .duration_seconds
                .or_else(|| r.duration.as_deref().and_then(parse_clock))
                .unwrap_or(0);
            Some(Track {
                title: r.title.unwrap_or_else(|| id.clone()),
                id,
                artists: r
                    .artists
                    .unwrap_or_default()
                    .into_iter()
                    .map(|a| a.name)
                    .collect(),
                duration_secs,
            })
        })
        .collect())
}

/// `"3:07"` or `"1:02:05"` to seconds.
fn parse_clock(s: &str) -> Option<u64> {
    s.trim()
        .split(':')
        .try_fold(0u64, |acc, part| Some(acc * 60 + part.parse::<u64>().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_songs_and_skips_unplayable_entries() {
        let json = r#"[
            {"videoId": "abc123", "title": "Skibidi", "resultType": "song",
             "artists": [{"name": "Little Big", "id": "UC1"}, {"name": "Guest", "id": null}],
             "album": {"name": "Single", "id": "MPRE"}, "duration": "3:07",
             "duration_seconds": 187, "isExplicit": false},
            {"browseId": "UC1", "artist": "Little Big", "resultType": "artist"},
            {"videoId": "def456", "title": "Live", "artists": null, "duration": "1:02:05"}
        ]"#;

        let tracks = parse_search_output(json).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, "abc123");
        assert_eq!(tracks[0].artists, vec!["Little Big", "Guest"]);
        assert_eq!(tracks[0].subtitle(), "Little Big, Guest - 3:07");
        assert_eq!(tracks[1].duration_secs, 3_725);
        assert!(tracks[1].artists.is_empty());
    }

    #[test]
    fn rejects_non_json_output() {
        assert!(parse_search_output("Traceback (most recent call last)").is_err());
    }

    #[test]
    fn clock_parsing() {
        assert_eq!(parse_clock("0:59"), Some(59));
        assert_eq!(parse_clock("10:00"), Some(600));
        assert_eq!(parse_clock("n/a"), None);
    }

    #[test]
    fn missing_interpreter_is_an_error() {
        let catalog = ScriptCatalog::new("/nonexistent/python".into(), None, None);
        assert!(catalog.search("x", SearchFilter::Songs).is_err());
    }
}
