//! Symphonia-backed [`Demuxer`] for local media files.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecParameters, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet as SymphoniaPacket, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::{Demuxer, Frame, FrameDecoder, MediaOpener, Packet, StreamInfo, StreamKind, stereo_payload};
use crate::error::EngineError;

/// Opens files through Symphonia's default probe (all enabled container formats).
#[derive(Clone, Copy, Debug, Default)]
pub struct SymphoniaOpener;

impl MediaOpener for SymphoniaOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn Demuxer>, EngineError> {
        Ok(Box::new(MediaFile::open(path)?))
    }
}

/// A probed container. `None` once closed.
pub struct MediaFile {
    path: PathBuf,
    format: Option<Box<dyn FormatReader>>,
}

impl MediaFile {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        let open_err = |reason: String| EngineError::Open {
            path: path.to_path_buf(),
            reason,
        };

        let file = File::open(path).map_err(|e| open_err(e.to_string()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| open_err(e.to_string()))?;

        tracing::debug!(path = ?path, tracks = probed.format.tracks().len(), "container opened");
        Ok(Self {
            path: path.to_path_buf(),
            format: Some(probed.format),
        })
    }
}

impl Demuxer for MediaFile {
    fn streams(&self) -> Vec<StreamInfo> {
        self.format
            .as_ref()
            .map(|f| f.tracks().iter().map(stream_info).collect())
            .unwrap_or_default()
    }

    fn open_decoder(&mut self, stream: &StreamInfo) -> Result<Box<dyn FrameDecoder>, EngineError> {
        let format = self
            .format
            .as_ref()
            .ok_or_else(|| EngineError::StreamOpen(format!("{:?} is closed", self.path)))?;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.id == stream.id)
            .ok_or_else(|| EngineError::StreamOpen(format!("no track with id {}", stream.id)))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| EngineError::StreamOpen(e.to_string()))?;

        Ok(Box::new(TrackDecoder {
            decoder: Some(decoder),
        }))
    }

    fn next_packet(&mut self) -> Result<Option<Packet>, EngineError> {
        let Some(format) = self.format.as_mut() else {
            return Ok(None);
        };

        match format.next_packet() {
            Ok(p) => Ok(Some(Packet {
                stream_id: p.track_id(),
                ts: p.ts(),
                dur: p.dur(),
                data: p.data,
            })),
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(EngineError::PacketRead(e.to_string())),
        }
    }

    fn close(&mut self) {
        if self.format.take().is_some() {
            tracing::debug!(path = ?self.path, "container closed");
        }
    }
}

struct TrackDecoder {
    decoder: Option<Box<dyn Decoder>>,
}

impl FrameDecoder for TrackDecoder {
    fn decode(&mut self, packet: Packet) -> Result<Frame, EngineError> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| EngineError::FrameDecode("decoder closed".to_string()))?;

        let packet =
            SymphoniaPacket::new_from_boxed_slice(packet.stream_id, packet.ts, packet.dur, packet.data);
        let decoded = decoder
            .decode(&packet)
            .map_err(|e| EngineError::FrameDecode(e.to_string()))?;

        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f64>::new(decoded.frames() as u64, spec);
        buf.copy_interleaved_ref(decoded);

        Ok(Frame {
            payload: stereo_payload(buf.samples(), spec.channels.count()),
        })
    }

    fn close(&mut self) {
        self.decoder = None;
    }
}

fn stream_info(track: &Track) -> StreamInfo {
    let params = &track.codec_params;
    StreamInfo {
        id: track.id,
        kind: if params.codec == CODEC_TYPE_NULL {
            StreamKind::Other
        } else {
            StreamKind::Audio
        },
        sample_rate: params.sample_rate,
        channels: params.channels.map(|c| c.count()),
        duration_ms: duration_ms_from_codec_params(params),
        codec: codec_name_from_params(params),
    }
}

/// Duration in milliseconds when the container reports total frames and a rate.
fn duration_ms_from_codec_params(params: &CodecParameters) -> Option<u64> {
    let frames = params.n_frames?;
    let rate = params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

fn codec_name_from_params(params: &CodecParameters) -> Option<String> {
    use symphonia::core::codecs::*;
    let name = match params.codec {
        CODEC_TYPE_AAC => "AAC",
        CODEC_TYPE_MP3 => "MP3",
        CODEC_TYPE_FLAC => "FLAC",
        CODEC_TYPE_ALAC => "ALAC",
        CODEC_TYPE_VORBIS => "VORBIS",
        CODEC_TYPE_OPUS => "OPUS",
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM_S16",
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM_F32",
        _ => return None,
    };
    Some(name.to_string())
}
