//! Bounded single-producer/single-consumer channel of stereo samples.
//!
//! The decode worker pushes, the streaming adapter pulls:
//! - pushes block while the channel is full, so memory stays bounded
//! - pulls block while it is empty, until data arrives or the producer closes
//! - `close()` never discards what is already buffered
//!
//! Both blocking sides wake at least every [`CANCEL_POLL`] to observe a
//! [`CancellationToken`], so a stuck peer can never pin a session open.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::config::DEFAULT_SAMPLE_RATE;
use crate::sample::Sample;

/// Upper bound on how long a blocked push or pull goes without checking its token.
pub const CANCEL_POLL: Duration = Duration::from_millis(50);

/// Longest buffer window [`calc_capacity`] will size for.
pub const MAX_BUFFER_SECONDS: f32 = 10.0;

/// Highest rate [`calc_capacity`] sizes for; containers can advertise nonsense.
const MAX_SIZING_RATE: u32 = 384_000;

/// Channel capacity, in stereo samples, for `buffer_seconds` of audio at `rate_hz`.
///
/// Non-finite or non-positive durations fall back to one second and longer ones are
/// clamped to [`MAX_BUFFER_SECONDS`]; an unknown (zero) rate falls back to
/// [`DEFAULT_SAMPLE_RATE`]. The result is at least 1.
pub fn calc_capacity(rate_hz: u32, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds.min(MAX_BUFFER_SECONDS)
    } else {
        1.0
    };
    let rate = if rate_hz == 0 { DEFAULT_SAMPLE_RATE } else { rate_hz.min(MAX_SIZING_RATE) };
    ((f64::from(rate) * f64::from(secs)).ceil() as usize).max(1)
}

/// Result of a blocking push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Every sample was enqueued.
    Pushed,
    /// The token fired before all samples fit; the rest were dropped.
    Cancelled,
    /// The receiver is gone, or the channel was already closed.
    Disconnected,
}

struct Shared {
    inner: Mutex<Inner>,
    cv: Condvar,
    capacity: usize,
}

struct Inner {
    queue: VecDeque<Sample>,
    closed: bool,
    receiver_alive: bool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Inner>) -> MutexGuard<'a, Inner> {
        let (guard, _timeout) = self
            .cv
            .wait_timeout(guard, CANCEL_POLL)
            .unwrap_or_else(PoisonError::into_inner);
        guard
    }

    fn close(&self) {
        let mut g = self.lock();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }
}

/// Create a channel holding at most `capacity` samples (clamped to at least 1).
pub fn sample_channel(capacity: usize) -> (SampleSender, SampleReceiver) {
    let shared = Arc::new(Shared {
        inner: Mutex::new(Inner {
            queue: VecDeque::with_capacity(capacity.max(1)),
            closed: false,
            receiver_alive: true,
        }),
        cv: Condvar::new(),
        capacity: capacity.max(1),
    });
    (
        SampleSender {
            shared: shared.clone(),
        },
        SampleReceiver { shared },
    )
}

/// Producing half. Dropping it closes the channel.
pub struct SampleSender {
    shared: Arc<Shared>,
}

impl SampleSender {
    /// Enqueue `samples` in order, blocking while the channel is full.
    ///
    /// `cancel` is checked before every batch and at least every [`CANCEL_POLL`]
    /// while blocked; once it fires no further samples are enqueued.
    pub fn push_blocking(&self, samples: &[Sample], cancel: &CancellationToken) -> PushOutcome {
        let mut offset = 0;
        let mut g = self.shared.lock();

        while offset < samples.len() {
            if cancel.is_cancelled() {
                return PushOutcome::Cancelled;
            }
            if g.closed || !g.receiver_alive {
                return PushOutcome::Disconnected;
            }

            let room = self.shared.capacity.saturating_sub(g.queue.len());
            if room == 0 {
                g = self.shared.wait(g);
                continue;
            }

            let take = room.min(samples.len() - offset);
            g.queue.extend(&samples[offset..offset + take]);
            offset += take;
            self.shared.cv.notify_all();
        }

        PushOutcome::Pushed
    }

    /// Mark end of stream and wake the receiver. Idempotent.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

impl Drop for SampleSender {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Consuming half. Dropping it unblocks a producer waiting for room.
pub struct SampleReceiver {
    shared: Arc<Shared>,
}

impl SampleReceiver {
    /// Fill `out` from the front of the channel.
    ///
    /// Blocks until `out` is full, the channel is closed and drained, or `cancel`
    /// fires. Returns the number of samples written; anything short of `out.len()`
    /// means no more data will come from this call's perspective.
    pub fn recv_into(&self, out: &mut [Sample], cancel: &CancellationToken) -> usize {
        let mut filled = 0;
        let mut g = self.shared.lock();

        while filled < out.len() {
            if cancel.is_cancelled() {
                break;
            }

            let available = g.queue.len().min(out.len() - filled);
            if available > 0 {
                for (slot, sample) in out[filled..filled + available]
                    .iter_mut()
                    .zip(g.queue.drain(..available))
                {
                    *slot = sample;
                }
                filled += available;
                self.shared.cv.notify_all();
                continue;
            }

            if g.closed {
                break;
            }
            g = self.shared.wait(g);
        }

        filled
    }

    /// Buffered samples right now (best-effort snapshot).
    pub fn len(&self) -> usize {
        self.shared.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Whether the producer has closed the channel. Buffered samples may remain.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl Drop for SampleReceiver {
    fn drop(&mut self) {
        let mut g = self.shared.lock();
        g.receiver_alive = false;
        g.queue.clear();
        drop(g);
        self.shared.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn ramp(range: std::ops::Range<usize>) -> Vec<Sample> {
        range.map(|k| Sample::new(k as f64, k as f64)).collect()
    }

    #[test]
    fn calc_capacity_fallbacks() {
        assert_eq!(calc_capacity(48_000, 1.0), 48_000);
        assert_eq!(calc_capacity(48_000, 0.5), 24_000);
        assert_eq!(calc_capacity(48_000, -1.0), 48_000);
        assert_eq!(calc_capacity(48_000, f32::NAN), 48_000);
        assert_eq!(calc_capacity(0, 1.0), 44_100);
        assert_eq!(calc_capacity(1, 0.01), 1);
    }

    #[test]
    fn calc_capacity_clamps_oversized_windows() {
        assert_eq!(calc_capacity(44_100, 1.0e12), 441_000);
        assert_eq!(calc_capacity(44_100, f32::MAX), 441_000);
        assert_eq!(calc_capacity(u32::MAX, 10.0), 3_840_000);

        let (tx, rx) = sample_channel(calc_capacity(44_100, 3_600.0));
        assert_eq!(tx.capacity(), 441_000);
        assert_eq!(rx.capacity(), 441_000);
    }

    #[test]
    fn preserves_order_across_wraparound() {
        let (tx, rx) = sample_channel(4);
        let cancel = CancellationToken::new();
        let producer = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                for chunk in ramp(0..100).chunks(3) {
                    assert_eq!(tx.push_blocking(chunk, &cancel), PushOutcome::Pushed);
                }
            })
        };

        let mut got = Vec::new();
        let mut buf = [Sample::SILENCE; 7];
        loop {
            let n = rx.recv_into(&mut buf, &cancel);
            got.extend_from_slice(&buf[..n]);
            if n < buf.len() {
                break;
            }
        }
        producer.join().unwrap();
        assert_eq!(got, ramp(0..100));
    }

    #[test]
    fn push_blocks_at_capacity() {
        let (tx, rx) = sample_channel(8);
        let cancel = CancellationToken::new();
        let producer = {
            let cancel = cancel.clone();
            thread::spawn(move || tx.push_blocking(&ramp(0..20), &cancel))
        };

        thread::sleep(Duration::from_millis(100));
        assert_eq!(rx.len(), 8);
        assert!(!producer.is_finished());

        let mut buf = [Sample::SILENCE; 12];
        assert_eq!(rx.recv_into(&mut buf, &cancel), 12);
        assert_eq!(producer.join().unwrap(), PushOutcome::Pushed);
        assert!(rx.len() <= 8);
    }

    #[test]
    fn close_drains_remaining_then_reports_short() {
        let (tx, rx) = sample_channel(16);
        let cancel = CancellationToken::new();
        assert_eq!(tx.push_blocking(&ramp(0..3), &cancel), PushOutcome::Pushed);
        tx.close();
        tx.close();

        let mut buf = [Sample::SILENCE; 5];
        assert_eq!(rx.recv_into(&mut buf, &cancel), 3);
        assert_eq!(&buf[..3], ramp(0..3).as_slice());
        assert_eq!(rx.recv_into(&mut buf, &cancel), 0);
        assert!(rx.is_closed());
    }

    #[test]
    fn dropping_sender_closes() {
        let (tx, rx) = sample_channel(4);
        drop(tx);
        let mut buf = [Sample::SILENCE; 2];
        assert_eq!(rx.recv_into(&mut buf, &CancellationToken::new()), 0);
    }

    #[test]
    fn cancel_unblocks_full_push_promptly() {
        let (tx, rx) = sample_channel(4);
        let cancel = CancellationToken::new();
        let producer = {
            let cancel = cancel.clone();
            thread::spawn(move || tx.push_blocking(&ramp(0..10), &cancel))
        };
        thread::sleep(Duration::from_millis(60));

        let started = Instant::now();
        cancel.cancel();
        assert_eq!(producer.join().unwrap(), PushOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(rx.len(), 4);
    }

    #[test]
    fn cancel_unblocks_empty_recv() {
        let (_tx, rx) = sample_channel(4);
        let cancel = CancellationToken::new();
        let waiter = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                let mut buf = [Sample::SILENCE; 4];
                rx.recv_into(&mut buf, &cancel)
            })
        };
        thread::sleep(Duration::from_millis(20));
        cancel.cancel();
        assert_eq!(waiter.join().unwrap(), 0);
    }

    #[test]
    fn dropped_receiver_disconnects_producer() {
        let (tx, rx) = sample_channel(2);
        let cancel = CancellationToken::new();
        let producer = {
            let cancel = cancel.clone();
            thread::spawn(move || tx.push_blocking(&ramp(0..10), &cancel))
        };
        thread::sleep(Duration::from_millis(20));
        drop(rx);
        assert_eq!(producer.join().unwrap(), PushOutcome::Disconnected);
    }
}
