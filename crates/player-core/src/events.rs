/// Monotonic id of a playback session, unique per controller.
pub type SessionId = u64;

/// Notifications from the playback stages to whoever renders state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    /// Elapsed share of the expected duration, 0..=100.
    Progress { percent: u8 },
    /// A session ended early because of a decode-side failure.
    DecodeError { session: SessionId, message: String },
    /// The output drained the last sample of a session.
    StreamFinished { session: SessionId },
}
