//! Pull-based adapter between the sample channel and the output device.

use crate::cancel::CancellationToken;
use crate::queue::SampleReceiver;
use crate::sample::Sample;

/// Outcome of one pull.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// Samples written to the front of the caller's buffer.
    pub filled: usize,
    /// No further samples will ever be produced.
    pub finished: bool,
}

/// Something the output device can pull stereo samples from.
pub trait SampleSupplier: Send {
    /// Fill `out` from the front.
    ///
    /// A completely filled buffer means more may follow. A short fill (including
    /// zero) marks the final chunk, and every later call returns `(0, finished)`.
    fn pull(&mut self, out: &mut [Sample]) -> Chunk;
}

/// [`SampleSupplier`] over a session's channel that ends on close or cancellation.
pub struct CancellableStream {
    rx: SampleReceiver,
    cancel: CancellationToken,
    finished: bool,
}

impl CancellableStream {
    pub fn new(rx: SampleReceiver, cancel: CancellationToken) -> Self {
        Self {
            rx,
            cancel,
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl SampleSupplier for CancellableStream {
    fn pull(&mut self, out: &mut [Sample]) -> Chunk {
        if self.finished {
            return Chunk {
                filled: 0,
                finished: true,
            };
        }

        let filled = self.rx.recv_into(out, &self.cancel);
        if filled < out.len() {
            self.finished = true;
            tracing::debug!(filled, wanted = out.len(), "sample stream finished");
        }
        Chunk {
            filled,
            finished: self.finished,
        }
    }
}
