//! Track metadata and the search interface used to populate the track list.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A playable item as listed by the catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub duration_secs: u64,
}

impl Track {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// `"Artist A, Artist B - 3:07"`, the secondary line shown under the title.
    pub fn subtitle(&self) -> String {
        format!(
            "{} - {}",
            self.artists.join(", "),
            format_duration(self.duration_secs)
        )
    }
}

/// `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_duration(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Result-type filter understood by the catalog backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchFilter {
    #[default]
    Songs,
    Videos,
    Albums,
    Artists,
    Playlists,
    CommunityPlaylists,
    FeaturedPlaylists,
    Uploads,
}

impl SearchFilter {
    pub const ALL: [SearchFilter; 8] = [
        SearchFilter::Songs,
        SearchFilter::Videos,
        SearchFilter::Albums,
        SearchFilter::Artists,
        SearchFilter::Playlists,
        SearchFilter::CommunityPlaylists,
        SearchFilter::FeaturedPlaylists,
        SearchFilter::Uploads,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchFilter::Songs => "songs",
            SearchFilter::Videos => "videos",
            SearchFilter::Albums => "albums",
            SearchFilter::Artists => "artists",
            SearchFilter::Playlists => "playlists",
            SearchFilter::CommunityPlaylists => "community_playlists",
            SearchFilter::FeaturedPlaylists => "featured_playlists",
            SearchFilter::Uploads => "uploads",
        }
    }

    /// Next filter in [`SearchFilter::ALL`], wrapping around.
    pub fn cycle(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown search filter: {s}"))
    }
}

/// Where tracks come from.
pub trait CatalogSource: Send + Sync {
    fn search(&self, query: &str, filter: SearchFilter) -> anyhow::Result<Vec<Track>>;
}
