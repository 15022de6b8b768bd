//! Test doubles: a scripted container, a map-backed fetcher and a recording output.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::decode::{
    Demuxer, Frame, FrameDecoder, MediaOpener, Packet, StreamInfo, StreamKind, StreamSpec,
};
use crate::error::EngineError;
use crate::events::SessionId;
use crate::fetch::MediaFetcher;
use crate::playback::AudioOutput;
use crate::stream::SampleSupplier;

const VIDEO_ID: u32 = 0;
const AUDIO_ID: u32 = 1;

pub fn payload_of(pairs: &[(f64, f64)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pairs.len() * 16);
    for (l, r) in pairs {
        out.extend_from_slice(&l.to_le_bytes());
        out.extend_from_slice(&r.to_le_bytes());
    }
    out
}

/// `n` samples of `(value, value)`.
pub fn constant_frame(value: f64, n: usize) -> Vec<u8> {
    payload_of(&vec![(value, value); n])
}

/// Shared view of what a [`SyntheticContainer`] went through.
#[derive(Clone, Default)]
pub struct ContainerProbe {
    container_closed: Arc<AtomicBool>,
    decoder_closed: Arc<AtomicBool>,
    packets_read: Arc<AtomicUsize>,
}

impl ContainerProbe {
    pub fn container_closed(&self) -> bool {
        self.container_closed.load(Ordering::SeqCst)
    }

    pub fn decoder_closed(&self) -> bool {
        self.decoder_closed.load(Ordering::SeqCst)
    }

    pub fn packets_read(&self) -> usize {
        self.packets_read.load(Ordering::SeqCst)
    }
}

/// In-memory container whose audio packets decode to the given payloads verbatim.
pub struct SyntheticContainer {
    frames: VecDeque<Vec<u8>>,
    has_audio: bool,
    video_first: bool,
    refuse_decoder: bool,
    fail_decode_at: Option<usize>,
    sample_rate: u32,
    pending_audio: Option<Vec<u8>>,
    probe: ContainerProbe,
}

impl SyntheticContainer {
    pub fn new(frames: Vec<Vec<u8>>) -> Self {
        Self {
            frames: frames.into(),
            has_audio: true,
            video_first: false,
            refuse_decoder: false,
            fail_decode_at: None,
            sample_rate: 44_100,
            pending_audio: None,
            probe: ContainerProbe::default(),
        }
    }

    pub fn without_audio(mut self) -> Self {
        self.has_audio = false;
        self.video_first = true;
        self
    }

    /// Lists a video stream first and puts a video packet before every audio packet.
    pub fn with_video_first(mut self) -> Self {
        self.video_first = true;
        self
    }

    pub fn refusing_decoder(mut self) -> Self {
        self.refuse_decoder = true;
        self
    }

    /// Make the `index`th audio packet (0-based) fail to decode.
    pub fn failing_decode_at(mut self, index: usize) -> Self {
        self.fail_decode_at = Some(index);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn probe(&self) -> ContainerProbe {
        self.probe.clone()
    }
}

impl Demuxer for SyntheticContainer {
    fn streams(&self) -> Vec<StreamInfo> {
        let mut out = Vec::new();
        if self.video_first {
            out.push(StreamInfo {
                id: VIDEO_ID,
                kind: StreamKind::Other,
                sample_rate: None,
                channels: None,
                duration_ms: None,
                codec: None,
            });
        }
        if self.has_audio {
            out.push(StreamInfo {
                id: AUDIO_ID,
                kind: StreamKind::Audio,
                sample_rate: Some(self.sample_rate),
                channels: Some(2),
                duration_ms: None,
                codec: Some("SYNTH".to_string()),
            });
        }
        out
    }

    fn open_decoder(&mut self, stream: &StreamInfo) -> Result<Box<dyn FrameDecoder>, EngineError> {
        if self.refuse_decoder {
            return Err(EngineError::StreamOpen(format!("stream {} unsupported", stream.id)));
        }
        Ok(Box::new(PassthroughDecoder {
            decoded: 0,
            fail_at: self.fail_decode_at,
            closed: self.probe.decoder_closed.clone(),
        }))
    }

    fn next_packet(&mut self) -> Result<Option<Packet>, EngineError> {
        let (stream_id, data) = if let Some(audio) = self.pending_audio.take() {
            (AUDIO_ID, audio)
        } else {
            let Some(frame) = self.frames.pop_front() else {
                return Ok(None);
            };
            if self.video_first {
                self.pending_audio = Some(frame);
                (VIDEO_ID, vec![0xAB; 3])
            } else {
                (AUDIO_ID, frame)
            }
        };
        let ts = self.probe.packets_read.fetch_add(1, Ordering::SeqCst) as u64;
        Ok(Some(Packet {
            stream_id,
            ts,
            dur: 1,
            data: data.into_boxed_slice(),
        }))
    }

    fn close(&mut self) {
        self.probe.container_closed.store(true, Ordering::SeqCst);
    }
}

struct PassthroughDecoder {
    decoded: usize,
    fail_at: Option<usize>,
    closed: Arc<AtomicBool>,
}

impl FrameDecoder for PassthroughDecoder {
    fn decode(&mut self, packet: Packet) -> Result<Frame, EngineError> {
        let index = self.decoded;
        self.decoded += 1;
        if self.fail_at == Some(index) {
            return Err(EngineError::FrameDecode(format!("bad packet at ts {}", packet.ts)));
        }
        Ok(Frame {
            payload: packet.data.into_vec(),
        })
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Opens a fresh long-running container for each known path and keeps its probe.
#[derive(Default)]
pub struct SyntheticOpener {
    known: HashMap<PathBuf, Vec<Vec<u8>>>,
    no_audio: Vec<PathBuf>,
    probes: Arc<Mutex<Vec<(PathBuf, ContainerProbe)>>>,
}

impl SyntheticOpener {
    /// A container with more audio than a 100-sample channel can hold.
    pub fn with_track(mut self, path: &str) -> Self {
        let frames = (0..1_000).map(|k| constant_frame(k as f64, 64)).collect();
        self.known.insert(PathBuf::from(path), frames);
        self
    }

    /// A short container that ends after `samples` samples.
    pub fn with_short_track(mut self, path: &str, samples: usize) -> Self {
        self.known
            .insert(PathBuf::from(path), vec![constant_frame(0.5, samples)]);
        self
    }

    /// One good frame of 4 samples followed by a frame with a dangling float.
    pub fn with_broken_track(mut self, path: &str) -> Self {
        let mut bad = constant_frame(2.0, 1);
        bad.extend_from_slice(&2.0f64.to_le_bytes());
        self.known
            .insert(PathBuf::from(path), vec![constant_frame(1.0, 4), bad]);
        self
    }

    pub fn with_video_only(mut self, path: &str) -> Self {
        self.known.insert(PathBuf::from(path), Vec::new());
        self.no_audio.push(PathBuf::from(path));
        self
    }

    pub fn probes(&self) -> Arc<Mutex<Vec<(PathBuf, ContainerProbe)>>> {
        self.probes.clone()
    }
}

impl MediaOpener for SyntheticOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn Demuxer>, EngineError> {
        let frames = self.known.get(path).cloned().ok_or_else(|| EngineError::Open {
            path: path.to_path_buf(),
            reason: "not found".to_string(),
        })?;
        let mut container = SyntheticContainer::new(frames).with_sample_rate(100);
        if self.no_audio.iter().any(|p| p == path) {
            container = container.without_audio();
        }
        self.probes
            .lock()
            .unwrap()
            .push((path.to_path_buf(), container.probe()));
        Ok(Box::new(container))
    }
}

/// Resolves track ids from a fixed map.
#[derive(Default)]
pub struct MapFetcher {
    paths: HashMap<String, PathBuf>,
}

impl MapFetcher {
    pub fn with(mut self, id: &str, path: &str) -> Self {
        self.paths.insert(id.to_string(), PathBuf::from(path));
        self
    }
}

impl MediaFetcher for MapFetcher {
    fn ensure_local(&self, track_id: &str) -> anyhow::Result<PathBuf> {
        self.paths
            .get(track_id)
            .cloned()
            .ok_or_else(|| anyhow!("unknown track {track_id}"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputCall {
    Attach(SessionId),
    Clear,
}

#[derive(Default)]
pub struct OutputLog {
    pub calls: Vec<OutputCall>,
    pub overlapping_attaches: usize,
    pub live: Option<(SessionId, Box<dyn SampleSupplier>)>,
    pub fail_next_attach: bool,
}

/// Output device that records calls and holds the attached supplier without pulling.
#[derive(Clone, Default)]
pub struct RecordingOutput {
    pub log: Arc<Mutex<OutputLog>>,
}

impl AudioOutput for RecordingOutput {
    fn attach(
        &mut self,
        session: SessionId,
        supplier: Box<dyn SampleSupplier>,
        _spec: StreamSpec,
    ) -> anyhow::Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_next_attach {
            log.fail_next_attach = false;
            return Err(anyhow!("device unplugged"));
        }
        if log.live.is_some() {
            log.overlapping_attaches += 1;
        }
        log.calls.push(OutputCall::Attach(session));
        log.live = Some((session, supplier));
        Ok(())
    }

    fn clear(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(OutputCall::Clear);
        log.live = None;
    }
}
