use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use player_core::volume::VolumeState;
use player_core::{CatalogSource, PlayerState, SearchFilter, Track};
use ratatui::{Terminal, backend::CrosstermBackend, widgets::ListState};

use crate::worker::{Command, Event, PlayerHandle};

use super::render;

const LOG_CAP: usize = 500;
const VOLUME_STEP: i16 = 5;

struct SearchReq {
    seq: u64,
    query: String,
    filter: SearchFilter,
}

struct SearchResp {
    seq: u64,
    query: String,
    tracks: Result<Vec<Track>, String>,
}

/// Launch the TUI, spawn the search thread, and drive the event loop until quit.
pub(crate) fn run_tui(
    catalog: Arc<dyn CatalogSource>,
    player: PlayerHandle,
    volume: Arc<VolumeState>,
    initial_query: Option<String>,
    filter: SearchFilter,
    log_rx: Receiver<String>,
) -> Result<()> {
    let (search_tx, search_rx) = unbounded::<SearchReq>();
    let (search_done_tx, search_done_rx) = unbounded::<SearchResp>();

    std::thread::spawn(move || {
        while let Ok(req) = search_rx.recv() {
            let tracks = catalog
                .search(&req.query, req.filter)
                .map_err(|e| format!("{e:#}"));
            if search_done_tx
                .send(SearchResp {
                    seq: req.seq,
                    query: req.query,
                    tracks,
                })
                .is_err()
            {
                break;
            }
        }
    });

    let mut app = App::new(
        filter,
        volume,
        player.commands.clone(),
        search_tx,
        search_done_rx,
        log_rx,
    );
    if let Some(query) = initial_query {
        app.query = query;
        app.request_search();
    }

    let mut term = match init_terminal() {
        Ok(term) => term,
        Err(e) => {
            player.shutdown();
            return Err(e);
        }
    };
    let result = ui_loop(&mut term, &mut app, &player.events);
    restore_terminal(&mut term)?;

    player.shutdown();
    result
}

/// In-memory UI state for rendering + interaction.
pub(crate) struct App {
    pub(crate) tracks: Vec<Track>,
    pub(crate) list_state: ListState,
    pub(crate) list_view_height: usize,

    pub(crate) query: String,
    pub(crate) editing: bool,
    pub(crate) filter: SearchFilter,
    pub(crate) searching: bool,
    search_seq: u64,
    search_tx: Sender<SearchReq>,
    search_rx: Receiver<SearchResp>,

    pub(crate) state: PlayerState,
    pub(crate) now_playing: Option<Track>,
    pub(crate) progress: u8,
    pub(crate) volume: Arc<VolumeState>,
    pub(crate) status: String,
    cmd_tx: Sender<Command>,

    pub(crate) logs_open: bool,
    pub(crate) logs: VecDeque<String>,
    pub(crate) logs_scroll: usize,
    log_rx: Receiver<String>,
}

impl App {
    fn new(
        filter: SearchFilter,
        volume: Arc<VolumeState>,
        cmd_tx: Sender<Command>,
        search_tx: Sender<SearchReq>,
        search_rx: Receiver<SearchResp>,
        log_rx: Receiver<String>,
    ) -> Self {
        Self {
            tracks: Vec::new(),
            list_state: ListState::default(),
            list_view_height: 0,
            query: String::new(),
            editing: false,
            filter,
            searching: false,
            search_seq: 0,
            search_tx,
            search_rx,
            state: PlayerState::Idle,
            now_playing: None,
            progress: 0,
            volume,
            status: "Press / to search".into(),
            cmd_tx,
            logs_open: false,
            logs: VecDeque::new(),
            logs_scroll: 0,
            log_rx,
        }
    }

    pub(crate) fn selected_track(&self) -> Option<&Track> {
        self.list_state.selected().and_then(|i| self.tracks.get(i))
    }

    fn request_search(&mut self) {
        let query = self.query.trim().to_string();
        if query.is_empty() {
            self.status = "Type a query first".into();
            return;
        }
        self.search_seq += 1;
        self.searching = true;
        self.status = format!("Searching {} for \"{query}\"...", self.filter);
        let req = SearchReq {
            seq: self.search_seq,
            query,
            filter: self.filter,
        };
        if self.search_tx.send(req).is_err() {
            self.searching = false;
            self.status = "Search unavailable".into();
        }
    }

    /// Apply finished searches; anything but the latest request is discarded.
    fn drain_search_results(&mut self) {
        while let Ok(resp) = self.search_rx.try_recv() {
            if resp.seq != self.search_seq {
                continue;
            }
            self.searching = false;
            match resp.tracks {
                Ok(tracks) => {
                    self.status = format!("{} results for \"{}\"", tracks.len(), resp.query);
                    self.tracks = tracks;
                    self.list_state
                        .select(if self.tracks.is_empty() { None } else { Some(0) });
                }
                Err(e) => self.status = format!("Search failed: {e}"),
            }
        }
    }

    fn apply_player_event(&mut self, event: Event) {
        match event {
            Event::Status(s) => self.status = s,
            Event::Playing(track) => {
                self.status = format!("Playing {}", track.title);
                self.now_playing = Some(track);
                self.state = PlayerState::Playing;
                self.progress = 0;
            }
            Event::Idle => {
                if self.state == PlayerState::Playing {
                    self.status = "Stopped".into();
                }
                self.state = PlayerState::Idle;
                self.now_playing = None;
                self.progress = 0;
            }
            Event::Progress(percent) => self.progress = percent.min(100),
            Event::Error(e) => self.status = format!("Error: {e}"),
        }
    }

    fn select_next(&mut self) {
        if self.tracks.is_empty() {
            return;
        }
        let next = match self.list_state.selected() {
            Some(i) => (i + 1).min(self.tracks.len() - 1),
            None => 0,
        };
        self.list_state.select(Some(next));
    }

    fn select_prev(&mut self) {
        if self.tracks.is_empty() {
            return;
        }
        let prev = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.list_state.select(Some(prev));
    }

    fn page_step(&self) -> usize {
        self.list_view_height.max(1)
    }

    fn page_down(&mut self) {
        if self.tracks.is_empty() {
            return;
        }
        let i = self.list_state.selected().unwrap_or(0);
        self.list_state
            .select(Some((i + self.page_step()).min(self.tracks.len() - 1)));
    }

    fn page_up(&mut self) {
        if self.tracks.is_empty() {
            return;
        }
        let i = self.list_state.selected().unwrap_or(0);
        self.list_state.select(Some(i.saturating_sub(self.page_step())));
    }

    fn select_first(&mut self) {
        if !self.tracks.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    fn select_last(&mut self) {
        if !self.tracks.is_empty() {
            self.list_state.select(Some(self.tracks.len() - 1));
        }
    }

    fn play_selected(&mut self) {
        let Some(track) = self.selected_track().cloned() else {
            self.status = "Nothing selected".into();
            return;
        };
        self.send(Command::Play(track));
    }

    fn toggle_playback(&mut self) {
        let selected = self.selected_track().cloned();
        if self.state == PlayerState::Idle && selected.is_none() {
            self.status = "Nothing selected".into();
            return;
        }
        self.send(Command::Toggle(selected));
    }

    fn send(&mut self, cmd: Command) {
        if self.cmd_tx.send(cmd).is_err() {
            self.status = "Player stopped".into();
        }
    }

    fn change_volume(&mut self, delta: i16) {
        let percent = self.volume.step(delta);
        self.status = format!("Volume {percent}%");
    }

    fn toggle_mute(&mut self) {
        self.status = if self.volume.toggle_mute() {
            "Muted".into()
        } else {
            format!("Volume {}%", self.volume.percent())
        };
    }

    fn cycle_filter(&mut self) {
        self.filter = self.filter.cycle();
        if self.query.trim().is_empty() {
            self.status = format!("Filter: {}", self.filter);
        } else {
            self.request_search();
        }
    }

    fn toggle_logs(&mut self) {
        self.logs_open = !self.logs_open;
        if self.logs_open {
            self.logs_scroll = 0;
        }
    }

    fn scroll_logs_up(&mut self) {
        if self.logs_scroll + 1 < self.logs.len() {
            self.logs_scroll += 1;
        }
    }

    fn scroll_logs_down(&mut self) {
        self.logs_scroll = self.logs_scroll.saturating_sub(1);
    }

    fn push_log_line(&mut self, line: String) {
        if self.logs.len() >= LOG_CAP {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }

    fn drain_logs(&mut self) {
        while let Ok(line) = self.log_rx.try_recv() {
            self.push_log_line(line);
        }
    }

    /// Handle one key press. Returns `true` when the user asked to quit.
    fn on_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        if self.editing {
            match key.code {
                KeyCode::Enter => {
                    self.editing = false;
                    self.request_search();
                }
                KeyCode::Esc => self.editing = false,
                KeyCode::Backspace => {
                    self.query.pop();
                }
                KeyCode::Char(c) => self.query.push(c),
                _ => {}
            }
            return false;
        }

        if self.logs_open {
            match key.code {
                KeyCode::Char('q') => return true,
                KeyCode::Esc | KeyCode::Char('l') => self.toggle_logs(),
                KeyCode::Up => self.scroll_logs_up(),
                KeyCode::Down => self.scroll_logs_down(),
                _ => {}
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('/') => self.editing = true,
            KeyCode::Up => self.select_prev(),
            KeyCode::Down => self.select_next(),
            KeyCode::PageUp => self.page_up(),
            KeyCode::PageDown => self.page_down(),
            KeyCode::Home => self.select_first(),
            KeyCode::End => self.select_last(),
            KeyCode::Enter => self.play_selected(),
            KeyCode::Char(' ') => self.toggle_playback(),
            KeyCode::Char('s') => self.send(Command::Stop),
            KeyCode::Char('+') | KeyCode::Char('=') => self.change_volume(VOLUME_STEP),
            KeyCode::Char('-') => self.change_volume(-VOLUME_STEP),
            KeyCode::Char('m') => self.toggle_mute(),
            KeyCode::Char('f') => self.cycle_filter(),
            KeyCode::Char('l') => self.toggle_logs(),
            _ => {}
        }
        false
    }
}

fn ui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    evt_rx: &Receiver<Event>,
) -> Result<()> {
    let tick = Duration::from_millis(33);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(ev) = evt_rx.try_recv() {
            app.apply_player_event(ev);
        }
        app.drain_search_results();
        app.drain_logs();

        terminal.draw(|f| render::draw(f, app))?;

        let timeout = tick.saturating_sub(last_tick.elapsed());
        if event::poll(timeout).context("poll terminal events")? {
            if let CEvent::Key(k) = event::read().context("read terminal event")? {
                if k.kind == KeyEventKind::Press && app.on_key(k) {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= tick {
            last_tick = Instant::now();
        }
    }
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("create terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    Ok(())
}
