use std::path::PathBuf;

/// Makes a track's media available on the local filesystem.
///
/// Implementations must be idempotent: a second call for the same id returns the
/// same path without fetching again.
pub trait MediaFetcher {
    fn ensure_local(&self, track_id: &str) -> anyhow::Result<PathBuf>;
}
