//! Streaming demux/decode stage.
//!
//! [`begin_decode`] opens a local media file, picks its first audio stream and spawns a
//! worker that pushes decoded [`Sample`]s into a bounded channel until the stream ends,
//! the session is cancelled, or a mid-stream error occurs. Mid-stream errors are
//! reported on the session's own error channel.
//!
//! The container is reached through [`MediaOpener`] / [`Demuxer`] / [`FrameDecoder`] so
//! the worker loop doesn't care whether packets come from Symphonia or a test fixture.

mod media_file;

use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::cancel::CancellationToken;
use crate::config::{DEFAULT_SAMPLE_RATE, PlaybackConfig};
use crate::error::EngineError;
use crate::queue::{PushOutcome, SampleReceiver, SampleSender, calc_capacity, sample_channel};
use crate::sample::Sample;

pub use media_file::{MediaFile, SymphoniaOpener};

/// What kind of elementary stream a container track carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Audio,
    Other,
}

/// Container-level description of one elementary stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub id: u32,
    pub kind: StreamKind,
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
    pub duration_ms: Option<u64>,
    pub codec: Option<String>,
}

/// One compressed unit read from the container.
#[derive(Clone, Debug)]
pub struct Packet {
    pub stream_id: u32,
    pub ts: u64,
    pub dur: u64,
    pub data: Box<[u8]>,
}

/// Decoder output: interleaved stereo little-endian `f64` pairs.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    pub payload: Vec<u8>,
}

/// An open container.
pub trait Demuxer: Send {
    fn streams(&self) -> Vec<StreamInfo>;

    /// Create a decoder for one of the streams returned by [`Demuxer::streams`].
    fn open_decoder(&mut self, stream: &StreamInfo) -> Result<Box<dyn FrameDecoder>, EngineError>;

    /// Next packet from any stream, or `None` at end of stream.
    fn next_packet(&mut self) -> Result<Option<Packet>, EngineError>;

    fn close(&mut self) {}
}

/// Decoder bound to a single audio stream.
pub trait FrameDecoder: Send {
    fn decode(&mut self, packet: Packet) -> Result<Frame, EngineError>;

    fn close(&mut self) {}
}

/// Opens containers by path.
pub trait MediaOpener: Send {
    fn open(&self, path: &Path) -> Result<Box<dyn Demuxer>, EngineError>;
}

/// Negotiated parameters of a started session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub duration_ms: Option<u64>,
}

/// Handles returned by a successful session start.
pub struct DecodeSession {
    pub spec: StreamSpec,
    pub samples: SampleReceiver,
    pub errors: Receiver<EngineError>,
    pub worker: JoinHandle<()>,
}

/// Open `path` with Symphonia and start decoding its first audio stream.
///
/// `Open`, `NoAudioStream` and `StreamOpen` are returned synchronously and leave
/// nothing running. A token that is already cancelled yields a session that ends
/// without producing samples.
pub fn begin_decode(
    path: &Path,
    cancel: CancellationToken,
    config: &PlaybackConfig,
) -> Result<DecodeSession, EngineError> {
    let demuxer = SymphoniaOpener.open(path)?;
    start_decode(demuxer, cancel, config)
}

/// Start decoding from an already-open container.
pub fn start_decode(
    mut demuxer: Box<dyn Demuxer>,
    cancel: CancellationToken,
    config: &PlaybackConfig,
) -> Result<DecodeSession, EngineError> {
    let streams = demuxer.streams();
    let Some(audio) = streams.iter().find(|s| s.kind == StreamKind::Audio).cloned() else {
        demuxer.close();
        return Err(EngineError::NoAudioStream {
            streams: streams.len(),
        });
    };

    let decoder = match demuxer.open_decoder(&audio) {
        Ok(d) => d,
        Err(e) => {
            demuxer.close();
            return Err(e);
        }
    };

    let spec = StreamSpec {
        sample_rate: audio.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
        duration_ms: audio.duration_ms,
    };
    let capacity = calc_capacity(spec.sample_rate, config.buffer_seconds);
    let (sample_tx, sample_rx) = sample_channel(capacity);
    let (error_tx, error_rx) = crossbeam_channel::bounded(config.error_channel_capacity.max(1));

    tracing::info!(
        stream = audio.id,
        codec = audio.codec.as_deref().unwrap_or("unknown"),
        sample_rate = spec.sample_rate,
        channels = audio.channels.unwrap_or(0),
        capacity,
        "decode session starting"
    );

    let session = MediaSession {
        demuxer,
        decoder,
        audio_stream: audio.id,
        samples: sample_tx,
        errors: error_tx,
        cancel,
    };
    let worker = thread::spawn(move || {
        let exit = session.run();
        tracing::info!(?exit, "decode session finished");
    });

    Ok(DecodeSession {
        spec,
        samples: sample_rx,
        errors: error_rx,
        worker,
    })
}

/// Parse a frame payload into stereo samples.
///
/// The payload must be a whole number of little-endian `f64` values, and an even
/// number of them. A malformed payload yields no samples at all.
pub fn samples_from_payload(payload: &[u8]) -> Result<Vec<Sample>, EngineError> {
    const SAMPLE_BYTES: usize = 2 * size_of::<f64>();
    if payload.len() % SAMPLE_BYTES != 0 {
        return Err(EngineError::MalformedPayload {
            bytes: payload.len(),
        });
    }

    Ok(payload
        .chunks_exact(SAMPLE_BYTES)
        .map(|pair| {
            let (left, right) = pair.split_at(size_of::<f64>());
            Sample::new(read_f64_le(left), read_f64_le(right))
        })
        .collect())
}

/// Encode interleaved samples with `channels` channels as a stereo payload.
///
/// Mono is duplicated into both sides; channels past the second are dropped.
pub fn stereo_payload(interleaved: &[f64], channels: usize) -> Vec<u8> {
    let channels = channels.max(1);
    let frames = interleaved.len() / channels;
    let mut out = Vec::with_capacity(frames * 2 * size_of::<f64>());
    for frame in interleaved.chunks_exact(channels) {
        let left = frame[0];
        let right = if channels > 1 { frame[1] } else { left };
        out.extend_from_slice(&left.to_le_bytes());
        out.extend_from_slice(&right.to_le_bytes());
    }
    out
}

fn read_f64_le(bytes: &[u8]) -> f64 {
    let mut raw = [0u8; size_of::<f64>()];
    raw.copy_from_slice(bytes);
    f64::from_le_bytes(raw)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionExit {
    EndOfStream,
    Cancelled,
    ReceiverGone,
    Failed,
}

/// Everything a running session owns. Dropping it releases all of it exactly once.
struct MediaSession {
    demuxer: Box<dyn Demuxer>,
    decoder: Box<dyn FrameDecoder>,
    audio_stream: u32,
    samples: SampleSender,
    errors: Sender<EngineError>,
    cancel: CancellationToken,
}

impl MediaSession {
    fn run(mut self) -> SessionExit {
        self.pump()
    }

    fn pump(&mut self) -> SessionExit {
        loop {
            if self.cancel.is_cancelled() {
                return SessionExit::Cancelled;
            }

            let packet = match self.demuxer.next_packet() {
                Ok(Some(p)) => p,
                Ok(None) => return SessionExit::EndOfStream,
                Err(e) => return self.fail(e),
            };
            if packet.stream_id != self.audio_stream {
                continue;
            }

            let frame = match self.decoder.decode(packet) {
                Ok(f) => f,
                Err(e) => return self.fail(e),
            };
            let samples = match samples_from_payload(&frame.payload) {
                Ok(s) => s,
                Err(e) => return self.fail(e),
            };

            match self.samples.push_blocking(&samples, &self.cancel) {
                PushOutcome::Pushed => {}
                PushOutcome::Cancelled => return SessionExit::Cancelled,
                PushOutcome::Disconnected => return SessionExit::ReceiverGone,
            }
        }
    }

    fn fail(&self, err: EngineError) -> SessionExit {
        tracing::warn!(error = %err, "decode session aborted");
        match self.errors.try_send(err) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(e)) => {
                tracing::warn!(error = %e, "error channel full, dropping report");
            }
        }
        SessionExit::Failed
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.decoder.close();
        self.demuxer.close();
        self.samples.close();
        tracing::debug!(stream = self.audio_stream, "decode session released");
    }
}
