//! Decode-to-speaker playback engine.
//!
//! A session flows through these stages:
//! - [`decode`] demuxes a local media file and decodes its first audio stream on a worker thread
//! - [`queue`] carries stereo [`Sample`]s between the worker and the output with bounded memory
//! - [`stream`] adapts the queue to the pull interface the output device drives
//! - [`playback`] owns the CPAL output stream
//! - [`controller`] ties the stages together and guarantees one live session per device
//! - [`progress`] emits playback percentage on a fixed cadence

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod decode;
pub mod device;
pub mod error;
pub mod events;
pub mod fetch;
pub mod playback;
pub mod progress;
pub mod queue;
pub mod sample;
pub mod stream;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancellationToken;
pub use catalog::{CatalogSource, SearchFilter, Track};
pub use config::PlaybackConfig;
pub use controller::{PlaybackController, PlayerState};
pub use error::{EngineError, PlayError};
pub use events::{PlayerEvent, SessionId};
pub use fetch::MediaFetcher;
pub use sample::Sample;
