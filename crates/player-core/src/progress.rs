//! Periodic playback-percentage updates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, select, tick};

use crate::events::PlayerEvent;

/// Wall-clock progress of the current session.
#[derive(Clone, Copy, Debug)]
pub struct ProgressState {
    started: Instant,
    expected: Duration,
}

impl ProgressState {
    pub fn new(started: Instant, expected: Duration) -> Self {
        Self { started, expected }
    }

    /// `floor(elapsed / expected * 100)` clamped to 0..=100; zero when no duration is known.
    pub fn percent_at(&self, now: Instant) -> u8 {
        if self.expected.is_zero() {
            return 0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        let pct = (elapsed.as_secs_f64() / self.expected.as_secs_f64() * 100.0).floor();
        pct.clamp(0.0, 100.0) as u8
    }
}

struct TickerThread {
    stop_tx: Sender<()>,
    running: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// Emits [`PlayerEvent::Progress`] on a fixed interval while a session plays.
pub struct ProgressTicker {
    interval: Duration,
    events: Sender<PlayerEvent>,
    active: Option<TickerThread>,
}

impl ProgressTicker {
    pub fn new(interval: Duration, events: Sender<PlayerEvent>) -> Self {
        Self {
            interval,
            events,
            active: None,
        }
    }

    /// Restart the ticker for a session expected to last `expected`.
    ///
    /// Any running loop is stopped first, then `0` is emitted immediately.
    pub fn start(&mut self, expected: Duration) {
        self.stop();
        let _ = self.events.send(PlayerEvent::Progress { percent: 0 });

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();
        let events = self.events.clone();
        let ticks = tick(self.interval);
        let state = ProgressState::new(Instant::now(), expected);

        let handle = thread::spawn(move || {
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticks) -> at => {
                        let Ok(at) = at else { break };
                        let percent = state.percent_at(at);
                        if events.send(PlayerEvent::Progress { percent }).is_err() {
                            break;
                        }
                    }
                }
            }
            running_thread.store(false, Ordering::Release);
        });

        tracing::debug!(expected_secs = expected.as_secs(), "progress ticker started");
        self.active = Some(TickerThread {
            stop_tx,
            running,
            handle,
        });
    }

    /// Stop the loop and wait for its thread. A no-op when not running.
    pub fn stop(&mut self) {
        let Some(ticker) = self.active.take() else {
            return;
        };
        let _ = ticker.stop_tx.try_send(());
        if ticker.handle.join().is_err() {
            tracing::warn!("progress ticker thread panicked");
        }
        tracing::debug!("progress ticker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|t| t.running.load(Ordering::Acquire))
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
