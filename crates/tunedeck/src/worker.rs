//! Player thread: owns the [`PlaybackController`] so fetching and decoding setup never
//! stall the UI loop.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use player_core::decode::SymphoniaOpener;
use player_core::playback::CpalOutput;
use player_core::volume::VolumeState;
use player_core::{PlayError, PlaybackConfig, PlaybackController, PlayerEvent, PlayerState, Track};

use crate::fetch::CachedFetcher;

/// Requests from the UI.
#[derive(Debug)]
pub(crate) enum Command {
    Play(Track),
    /// Play/pause button; carries the current selection for the idle case.
    Toggle(Option<Track>),
    Stop,
    Quit,
}

/// Updates for the UI.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Event {
    Status(String),
    Playing(Track),
    Idle,
    Progress(u8),
    Error(String),
}

pub(crate) struct PlayerHandle {
    pub(crate) commands: Sender<Command>,
    pub(crate) events: Receiver<Event>,
    thread: JoinHandle<()>,
}

impl PlayerHandle {
    /// Stop playback and wait for the player thread to exit.
    pub(crate) fn shutdown(self) {
        let _ = self.commands.send(Command::Quit);
        if self.thread.join().is_err() {
            tracing::warn!("player thread panicked");
        }
    }
}

/// Start the player thread. The CPAL output is created on that thread and never leaves it.
pub(crate) fn spawn_player(
    device: cpal::Device,
    fetcher: CachedFetcher,
    volume: Arc<VolumeState>,
    config: PlaybackConfig,
) -> Result<PlayerHandle> {
    let (cmd_tx, cmd_rx) = unbounded::<Command>();
    let (evt_tx, evt_rx) = unbounded::<Event>();

    let thread = thread::Builder::new()
        .name("player".into())
        .spawn(move || {
            let (player_tx, player_rx) = unbounded::<PlayerEvent>();
            let output = CpalOutput::new(device, volume, player_tx.clone());
            let controller = PlaybackController::new(
                Box::new(fetcher),
                Box::new(SymphoniaOpener),
                Box::new(output),
                player_tx,
                config,
            );
            worker_main(controller, cmd_rx, player_rx, evt_tx);
        })
        .context("spawn player thread")?;

    Ok(PlayerHandle {
        commands: cmd_tx,
        events: evt_rx,
        thread,
    })
}

pub(crate) fn worker_main(
    mut controller: PlaybackController,
    cmd_rx: Receiver<Command>,
    player_rx: Receiver<PlayerEvent>,
    evt_tx: Sender<Event>,
) {
    loop {
        select! {
            recv(cmd_rx) -> cmd => match cmd {
                Ok(Command::Play(track)) => {
                    announce_loading(&evt_tx, &track);
                    match controller.play(&track) {
                        Ok(()) => report_state(&controller, &evt_tx),
                        Err(e) => report_error(&controller, &evt_tx, &e),
                    }
                }
                Ok(Command::Toggle(selected)) => {
                    if controller.state() == PlayerState::Idle {
                        if let Some(track) = &selected {
                            announce_loading(&evt_tx, track);
                        }
                    }
                    match controller.toggle(selected.as_ref()) {
                        Ok(_) => report_state(&controller, &evt_tx),
                        Err(e) => report_error(&controller, &evt_tx, &e),
                    }
                }
                Ok(Command::Stop) => {
                    controller.stop();
                    report_state(&controller, &evt_tx);
                }
                Ok(Command::Quit) | Err(_) => break,
            },
            recv(player_rx) -> event => {
                let Ok(event) = event else { break };
                if controller.handle_event(&event) {
                    report_state(&controller, &evt_tx);
                }
                match event {
                    PlayerEvent::Progress { percent } if controller.state() == PlayerState::Playing => {
                        evt_tx.send(Event::Progress(percent)).ok();
                    }
                    PlayerEvent::DecodeError { message, .. } => {
                        evt_tx.send(Event::Error(message)).ok();
                    }
                    _ => {}
                }
            }
        }
    }

    controller.stop();
    tracing::debug!("player thread exiting");
}

fn announce_loading(evt_tx: &Sender<Event>, track: &Track) {
    evt_tx.send(Event::Status(format!("Loading {}...", track.title))).ok();
}

fn report_state(controller: &PlaybackController, evt_tx: &Sender<Event>) {
    let event = match controller.now_playing() {
        Some(track) => Event::Playing(track.clone()),
        None => Event::Idle,
    };
    evt_tx.send(event).ok();
}

/// A failed play may still have retired the previous session, so resend state first.
fn report_error(controller: &PlaybackController, evt_tx: &Sender<Event>, err: &PlayError) {
    tracing::warn!(error = %err, "play failed");
    report_state(controller, evt_tx);
    evt_tx.send(Event::Error(err.to_string())).ok();
}
