//! Output stage (CPAL output stream).
//!
//! The callback pulls stereo samples from the attached [`SampleSupplier`], maps them to
//! the device's channel layout, applies the shared volume and converts to the device
//! sample format. Once the supplier reports its final chunk the callback emits silence
//! and, after a couple of silent buffers, sends a single [`PlayerEvent::StreamFinished`].

use std::sync::Arc;

use anyhow::{Result, anyhow};
use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::Sender;

use crate::decode::StreamSpec;
use crate::device;
use crate::events::{PlayerEvent, SessionId};
use crate::sample::Sample;
use crate::stream::SampleSupplier;
use crate::volume::VolumeState;

/// An audio sink that plays at most one supplier at a time.
pub trait AudioOutput {
    /// Start playing `supplier`. Any previously attached supplier is dropped first.
    fn attach(
        &mut self,
        session: SessionId,
        supplier: Box<dyn SampleSupplier>,
        spec: StreamSpec,
    ) -> Result<()>;

    /// Stop playback and drop the attached supplier, if any.
    fn clear(&mut self);
}

/// [`AudioOutput`] backed by a CPAL device.
pub struct CpalOutput {
    device: cpal::Device,
    volume: Arc<VolumeState>,
    events: Sender<PlayerEvent>,
    stream: Option<cpal::Stream>,
}

impl CpalOutput {
    pub fn new(device: cpal::Device, volume: Arc<VolumeState>, events: Sender<PlayerEvent>) -> Self {
        Self {
            device,
            volume,
            events,
            stream: None,
        }
    }
}

impl AudioOutput for CpalOutput {
    fn attach(
        &mut self,
        session: SessionId,
        supplier: Box<dyn SampleSupplier>,
        spec: StreamSpec,
    ) -> Result<()> {
        self.clear();

        let config = device::pick_output_config(&self.device, Some(spec.sample_rate))?;
        let mut stream_config: cpal::StreamConfig = config.clone().into();
        if let Some(buffer_size) = device::pick_buffer_size(&config) {
            stream_config.buffer_size = buffer_size;
        }
        if stream_config.sample_rate != spec.sample_rate {
            tracing::warn!(
                source_rate = spec.sample_rate,
                device_rate = stream_config.sample_rate,
                "device does not support the source rate; playback speed will differ"
            );
        }

        let hooks = CallbackHooks {
            session,
            volume: self.volume.clone(),
            events: self.events.clone(),
        };
        let stream = build_output_stream(
            &self.device,
            &stream_config,
            config.sample_format(),
            supplier,
            hooks,
        )?;
        stream.play()?;

        tracing::info!(
            session,
            rate = stream_config.sample_rate,
            channels = stream_config.channels,
            format = ?config.sample_format(),
            "output attached"
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn clear(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            drop(stream);
            tracing::debug!("output cleared");
        }
    }
}

struct CallbackHooks {
    session: SessionId,
    volume: Arc<VolumeState>,
    events: Sender<PlayerEvent>,
}

fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    supplier: Box<dyn SampleSupplier>,
    hooks: CallbackHooks,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, supplier, hooks),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, supplier, hooks),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, supplier, hooks),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, supplier, hooks),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    supplier: Box<dyn SampleSupplier>,
    hooks: CallbackHooks,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut feed = OutputFeed::new(supplier, hooks, config.channels as usize);
    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| feed.fill(data),
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Silent callbacks written after the final chunk before the session is reported finished.
///
/// The host may still be holding the buffer that carried the tail; tearing the stream
/// down from the same callback would cut it off.
const DRAIN_CALLBACKS: u32 = 2;

/// State owned by the output callback.
struct OutputFeed {
    supplier: Box<dyn SampleSupplier>,
    hooks: CallbackHooks,
    channels: usize,
    scratch: Vec<Sample>,
    /// Silent callbacks since the final chunk; `None` while samples are still flowing.
    drained: Option<u32>,
}

impl OutputFeed {
    fn new(supplier: Box<dyn SampleSupplier>, hooks: CallbackHooks, channels: usize) -> Self {
        Self {
            supplier,
            hooks,
            channels: channels.max(1),
            scratch: Vec::new(),
            drained: None,
        }
    }

    fn fill<T>(&mut self, data: &mut [T])
    where
        T: cpal::Sample + cpal::FromSample<f32>,
    {
        if let Some(drained) = self.drained.as_mut() {
            data.fill(<T as cpal::Sample>::from_sample::<f32>(0.0));
            if *drained < DRAIN_CALLBACKS {
                *drained += 1;
                if *drained == DRAIN_CALLBACKS {
                    let _ = self.hooks.events.send(PlayerEvent::StreamFinished {
                        session: self.hooks.session,
                    });
                }
            }
            return;
        }

        let frames = data.len() / self.channels;
        self.scratch.resize(frames, Sample::SILENCE);
        let chunk = self.supplier.pull(&mut self.scratch[..frames]);
        let gain = self.hooks.volume.gain();

        for (i, out) in data.chunks_mut(self.channels).enumerate() {
            let sample = if i < chunk.filled {
                self.scratch[i].scaled(gain)
            } else {
                Sample::SILENCE
            };
            for (ch, slot) in out.iter_mut().enumerate() {
                *slot = <T as cpal::Sample>::from_sample::<f32>(map_channel(sample, self.channels, ch));
            }
        }

        if chunk.finished {
            self.drained = Some(0);
        }
    }
}

/// Value for output channel `dst_ch` of a `dst_channels`-wide device.
///
/// - mono: average of left and right
/// - stereo: pass-through
/// - wider layouts: left, right, then silence
fn map_channel(sample: Sample, dst_channels: usize, dst_ch: usize) -> f32 {
    let v = match (dst_channels, dst_ch) {
        (1, _) => 0.5 * (sample.left + sample.right),
        (_, 0) => sample.left,
        (_, 1) => sample.right,
        _ => 0.0,
    };
    v as f32
}
