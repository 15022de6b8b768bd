//! Playback controller: the single owner of "what is playing right now".
//!
//! Every session gets a fresh [`CancellationToken`]. Starting a new session fully retires
//! the previous one (cancel, stop ticker, detach output, join worker) before the new
//! stream is attached, so the output device never sees two live sessions.

use std::path::Path;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::cancel::CancellationToken;
use crate::catalog::Track;
use crate::config::PlaybackConfig;
use crate::decode::{self, MediaOpener};
use crate::error::{EngineError, PlayError};
use crate::events::{PlayerEvent, SessionId};
use crate::fetch::MediaFetcher;
use crate::playback::AudioOutput;
use crate::progress::ProgressTicker;
use crate::stream::CancellableStream;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
}

impl PlayerState {
    /// Label for the play/pause control.
    pub fn button_label(self) -> &'static str {
        match self {
            PlayerState::Idle => "Play",
            PlayerState::Playing => "Pause",
        }
    }
}

struct ActiveSession {
    id: SessionId,
    track: Track,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
    error_reader: JoinHandle<()>,
}

pub struct PlaybackController {
    fetcher: Box<dyn MediaFetcher>,
    opener: Box<dyn MediaOpener>,
    output: Box<dyn AudioOutput>,
    ticker: ProgressTicker,
    events: Sender<PlayerEvent>,
    config: PlaybackConfig,
    next_session: SessionId,
    active: Option<ActiveSession>,
}

impl PlaybackController {
    pub fn new(
        fetcher: Box<dyn MediaFetcher>,
        opener: Box<dyn MediaOpener>,
        output: Box<dyn AudioOutput>,
        events: Sender<PlayerEvent>,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            fetcher,
            opener,
            output,
            ticker: ProgressTicker::new(config.progress_interval, events.clone()),
            events,
            config,
            next_session: 1,
            active: None,
        }
    }

    pub fn state(&self) -> PlayerState {
        if self.active.is_some() {
            PlayerState::Playing
        } else {
            PlayerState::Idle
        }
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.active.as_ref().map(|s| &s.track)
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|s| s.id)
    }

    /// Start `track`, replacing whatever is playing.
    ///
    /// Fetching and opening happen before the current session is touched: on error the
    /// previous state is left as it was.
    pub fn play(&mut self, track: &Track) -> Result<(), PlayError> {
        tracing::info!(id = %track.id, title = %track.title, "play requested");

        let path = self
            .fetcher
            .ensure_local(&track.id)
            .map_err(|cause| PlayError::Fetch {
                id: track.id.clone(),
                cause,
            })?;
        let cancel = CancellationToken::new();
        let session = self.open_session(&path, cancel.clone())?;

        self.retire_active(true);

        let id = self.next_session;
        self.next_session += 1;

        let stream = CancellableStream::new(session.samples, cancel.clone());
        if let Err(e) = self.output.attach(id, Box::new(stream), session.spec) {
            cancel.cancel();
            let _ = session.worker.join();
            tracing::warn!(session = id, error = %format!("{e:#}"), "output attach failed");
            return Err(PlayError::Output(e));
        }

        let error_reader = spawn_error_reader(id, session.errors, self.events.clone());
        self.ticker.start(track.duration());
        self.active = Some(ActiveSession {
            id,
            track: track.clone(),
            cancel,
            worker: session.worker,
            error_reader,
        });
        tracing::info!(session = id, path = ?path, "playing");
        Ok(())
    }

    fn open_session(
        &self,
        path: &Path,
        cancel: CancellationToken,
    ) -> Result<decode::DecodeSession, EngineError> {
        let demuxer = self.opener.open(path)?;
        decode::start_decode(demuxer, cancel, &self.config)
    }

    /// Kill switch: cancel the session, stop the ticker and detach the output.
    ///
    /// Returns without waiting for the decode worker. Safe to call when idle.
    pub fn stop(&mut self) {
        self.retire_active(false);
    }

    /// Same as [`PlaybackController::stop`]; there is no resume point.
    pub fn pause(&mut self) {
        self.stop();
    }

    /// Play/pause control: stop when playing, otherwise play `selected`.
    pub fn toggle(&mut self, selected: Option<&Track>) -> Result<PlayerState, PlayError> {
        match (self.state(), selected) {
            (PlayerState::Playing, _) => self.stop(),
            (PlayerState::Idle, Some(track)) => self.play(track)?,
            (PlayerState::Idle, None) => {}
        }
        Ok(self.state())
    }

    /// React to an event from the playback stages. Returns `true` when the state changed.
    pub fn handle_event(&mut self, event: &PlayerEvent) -> bool {
        match event {
            PlayerEvent::StreamFinished { session } if self.active_session() == Some(*session) => {
                tracing::info!(session, "playback finished");
                self.retire_active(false);
                true
            }
            _ => false,
        }
    }

    fn retire_active(&mut self, join: bool) {
        let Some(session) = self.active.take() else {
            return;
        };

        session.cancel.cancel();
        self.ticker.stop();
        self.output.clear();

        if join {
            if session.worker.join().is_err() {
                tracing::warn!(session = session.id, "decode worker panicked");
            }
            if session.error_reader.join().is_err() {
                tracing::warn!(session = session.id, "error reader panicked");
            }
        }
        tracing::debug!(session = session.id, joined = join, "session retired");
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.retire_active(true);
    }
}

/// Drain a session's error channel until the worker drops its sender.
fn spawn_error_reader(
    session: SessionId,
    errors: Receiver<EngineError>,
    events: Sender<PlayerEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for err in errors.iter() {
            tracing::warn!(session, error = %err, "playback error");
            let _ = events.send(PlayerEvent::DecodeError {
                session,
                message: err.to_string(),
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ContainerProbe, MapFetcher, OutputCall, RecordingOutput, SyntheticOpener};
    use crossbeam_channel::unbounded;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn track(id: &str, secs: u64) -> Track {
        Track {
            id: id.to_string(),
            title: format!("title {id}"),
            artists: vec!["artist".to_string()],
            duration_secs: secs,
        }
    }

    struct Rig {
        controller: PlaybackController,
        output: RecordingOutput,
        opener_probes: Arc<Mutex<Vec<(PathBuf, ContainerProbe)>>>,
        events: Receiver<PlayerEvent>,
    }

    fn rig() -> Rig {
        let fetcher = MapFetcher::default()
            .with("a", "/media/a.mp4")
            .with("b", "/media/b.mp4")
            .with("short", "/media/short.mp4")
            .with("video", "/media/video.mp4")
            .with("missing", "/media/missing.mp4")
            .with("broken", "/media/broken.mp4");
        let opener = SyntheticOpener::default()
            .with_track("/media/a.mp4")
            .with_track("/media/b.mp4")
            .with_short_track("/media/short.mp4", 10)
            .with_video_only("/media/video.mp4")
            .with_broken_track("/media/broken.mp4");
        let opener_probes = opener.probes();
        let output = RecordingOutput::default();
        let (tx, rx) = unbounded();
        let config = PlaybackConfig {
            progress_interval: Duration::from_secs(3600),
            ..PlaybackConfig::default()
        };
        let controller = PlaybackController::new(
            Box::new(fetcher),
            Box::new(opener),
            Box::new(output.clone()),
            tx,
            config,
        );
        Rig {
            controller,
            output,
            opener_probes,
            events: rx,
        }
    }

    #[test]
    fn play_attaches_and_reports_playing() {
        let mut rig = rig();
        assert_eq!(rig.controller.state().button_label(), "Play");
        rig.controller.play(&track("a", 180)).unwrap();

        assert_eq!(rig.controller.state(), PlayerState::Playing);
        assert_eq!(rig.controller.state().button_label(), "Pause");
        assert_eq!(rig.controller.now_playing().map(|t| t.id.as_str()), Some("a"));
        assert!(rig.output.log.lock().unwrap().live.is_some());
        assert_eq!(
            rig.events.recv_timeout(Duration::from_secs(1)),
            Ok(PlayerEvent::Progress { percent: 0 })
        );
    }

    #[test]
    fn switching_tracks_retires_the_old_session_first() {
        let mut rig = rig();
        rig.controller.play(&track("a", 180)).unwrap();
        rig.controller.play(&track("b", 200)).unwrap();

        let log = rig.output.log.lock().unwrap();
        assert_eq!(log.overlapping_attaches, 0);
        assert_eq!(
            log.calls,
            vec![OutputCall::Attach(1), OutputCall::Clear, OutputCall::Attach(2)]
        );
        drop(log);

        let probes = rig.opener_probes.lock().unwrap();
        assert_eq!(probes.len(), 2);
        assert!(probes[0].1.container_closed());
        assert!(!probes[1].1.container_closed());
        assert_eq!(rig.controller.now_playing().map(|t| t.id.as_str()), Some("b"));
    }

    #[test]
    fn stop_is_idempotent_and_releases_the_session() {
        let mut rig = rig();
        rig.controller.stop();
        rig.controller.play(&track("a", 180)).unwrap();
        rig.controller.stop();
        rig.controller.pause();

        assert_eq!(rig.controller.state(), PlayerState::Idle);
        assert!(rig.controller.now_playing().is_none());
        assert!(rig.output.log.lock().unwrap().live.is_none());

        let probe = rig.opener_probes.lock().unwrap()[0].1.clone();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !probe.container_closed() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(probe.container_closed());
    }

    #[test]
    fn failed_fetch_keeps_current_playback() {
        let mut rig = rig();
        rig.controller.play(&track("a", 180)).unwrap();
        let err = rig.controller.play(&track("nope", 10)).unwrap_err();
        assert!(matches!(err, PlayError::Fetch { .. }));
        assert_eq!(rig.controller.state(), PlayerState::Playing);
        assert_eq!(rig.controller.now_playing().map(|t| t.id.as_str()), Some("a"));
        assert_eq!(rig.output.log.lock().unwrap().calls.len(), 1);
    }

    #[test]
    fn failed_open_leaves_idle_state_untouched() {
        let mut rig = rig();
        let err = rig.controller.play(&track("video", 10)).unwrap_err();
        assert!(matches!(
            err,
            PlayError::Decode(EngineError::NoAudioStream { .. })
        ));
        let err = rig.controller.play(&track("missing", 10)).unwrap_err();
        assert!(matches!(err, PlayError::Decode(EngineError::Open { .. })));
        assert_eq!(rig.controller.state(), PlayerState::Idle);
        assert!(rig.output.log.lock().unwrap().calls.is_empty());
    }

    #[test]
    fn output_failure_reports_and_goes_idle() {
        let mut rig = rig();
        rig.output.log.lock().unwrap().fail_next_attach = true;
        let err = rig.controller.play(&track("a", 180)).unwrap_err();
        assert!(matches!(err, PlayError::Output(_)));
        assert_eq!(rig.controller.state(), PlayerState::Idle);
        let probe = rig.opener_probes.lock().unwrap()[0].1.clone();
        assert!(probe.container_closed());
    }

    #[test]
    fn toggle_flips_between_play_and_pause() {
        let mut rig = rig();
        let selected = track("a", 180);
        assert_eq!(rig.controller.toggle(None).unwrap(), PlayerState::Idle);
        assert_eq!(rig.controller.toggle(Some(&selected)).unwrap(), PlayerState::Playing);
        assert_eq!(rig.controller.toggle(Some(&selected)).unwrap(), PlayerState::Idle);
    }

    #[test]
    fn natural_end_returns_to_idle_and_ignores_stale_sessions() {
        let mut rig = rig();
        rig.controller.play(&track("short", 1)).unwrap();
        let session = rig.controller.active_session().unwrap();

        assert!(!rig
            .controller
            .handle_event(&PlayerEvent::StreamFinished { session: session + 7 }));
        assert_eq!(rig.controller.state(), PlayerState::Playing);

        assert!(rig
            .controller
            .handle_event(&PlayerEvent::StreamFinished { session }));
        assert_eq!(rig.controller.state(), PlayerState::Idle);
        assert_eq!(rig.controller.state().button_label(), "Play");
    }

    #[test]
    fn reading_the_attached_stream_reaches_the_end() {
        let mut rig = rig();
        rig.controller.play(&track("short", 1)).unwrap();
        let (session, mut supplier) = rig.output.log.lock().unwrap().live.take().unwrap();
        assert_eq!(Some(session), rig.controller.active_session());

        let mut buf = [crate::Sample::SILENCE; 16];
        let chunk = supplier.pull(&mut buf);
        assert_eq!((chunk.filled, chunk.finished), (10, true));
    }

    #[test]
    fn mid_stream_errors_reach_the_event_channel() {
        let mut rig = rig();
        rig.controller.play(&track("broken", 5)).unwrap();
        let session = rig.controller.active_session().unwrap();

        let (_, mut supplier) = rig.output.log.lock().unwrap().live.take().unwrap();
        let mut buf = [crate::Sample::SILENCE; 8];
        let chunk = supplier.pull(&mut buf);
        assert_eq!((chunk.filled, chunk.finished), (4, true));

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut reported = None;
        while Instant::now() < deadline {
            match rig.events.recv_timeout(Duration::from_millis(50)) {
                Ok(PlayerEvent::DecodeError { session: s, message }) => {
                    reported = Some((s, message));
                    break;
                }
                _ => continue,
            }
        }
        let (s, message) = reported.unwrap();
        assert_eq!(s, session);
        assert!(message.contains("malformed"));
    }
}
