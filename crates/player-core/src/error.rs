//! Error taxonomy for the decode engine and the playback controller.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while opening or decoding a media file.
///
/// `Open`, `NoAudioStream` and `StreamOpen` are returned synchronously from session
/// start. The rest are reported over the session's error channel and end the session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The container could not be opened or recognized.
    #[error("cannot open {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// The container opened but carries no decodable audio stream.
    #[error("no audio stream among {streams} stream(s)")]
    NoAudioStream { streams: usize },

    /// The audio stream's decoder could not be created.
    #[error("cannot open audio stream: {0}")]
    StreamOpen(String),

    /// Reading the next packet from the container failed.
    #[error("packet read failed: {0}")]
    PacketRead(String),

    /// The decoder rejected a packet.
    #[error("frame decode failed: {0}")]
    FrameDecode(String),

    /// A decoded frame is not a whole number of stereo `f64` samples.
    #[error("malformed frame payload of {bytes} bytes")]
    MalformedPayload { bytes: usize },
}

/// Why a `play` request did not start a new session.
#[derive(Error, Debug)]
pub enum PlayError {
    #[error("fetch failed for {id}: {cause:#}")]
    Fetch { id: String, cause: anyhow::Error },

    #[error(transparent)]
    Decode(#[from] EngineError),

    #[error("audio output: {0:#}")]
    Output(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_includes_cause_chain() {
        let cause = anyhow::anyhow!("404").context("download");
        let err = PlayError::Fetch {
            id: "abc".into(),
            cause,
        };
        assert_eq!(err.to_string(), "fetch failed for abc: download: 404");
    }
}
