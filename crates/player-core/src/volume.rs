use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Output gain shared between the UI and the audio callback.
#[derive(Debug)]
pub struct VolumeState {
    percent: AtomicU8,
    muted: AtomicBool,
}

impl VolumeState {
    pub fn new(percent: u8) -> Self {
        Self {
            percent: AtomicU8::new(percent.min(100)),
            muted: AtomicBool::new(false),
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    pub fn set_percent(&self, percent: u8) {
        self.percent.store(percent.min(100), Ordering::Relaxed);
    }

    /// Move the volume by `delta` points, clamped to 0..=100. Returns the new value.
    pub fn step(&self, delta: i16) -> u8 {
        let next = (self.percent() as i16 + delta).clamp(0, 100) as u8;
        self.set_percent(next);
        next
    }

    pub fn muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn toggle_mute(&self) -> bool {
        !self.muted.fetch_xor(true, Ordering::Relaxed)
    }

    /// Linear gain applied to every sample.
    pub fn gain(&self) -> f64 {
        if self.muted() {
            0.0
        } else {
            self.percent() as f64 / 100.0
        }
    }
}

impl Default for VolumeState {
    fn default() -> Self {
        Self::new(100)
    }
}
