use std::time::Duration;

/// Sample rate assumed when a stream does not advertise one.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Tuning parameters shared by the decode worker, the ticker and the controller.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Target buffer duration used to size the per-session sample channel.
    pub buffer_seconds: f32,
    /// Cadence of progress updates while a session is playing.
    pub progress_interval: Duration,
    /// Capacity of the per-session error channel.
    pub error_channel_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            buffer_seconds: 1.0,
            progress_interval: Duration::from_millis(500),
            error_channel_capacity: 50,
        }
    }
}
