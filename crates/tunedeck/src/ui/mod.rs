//! Ratatui UI loop.
//!
//! Keys:
//! - /: edit the search query (Enter submits, Esc cancels)
//! - f: cycle the search filter
//! - Up/Down, PgUp/PgDn, Home/End: move selection
//! - Enter: play selected
//! - Space: play/pause
//! - s: stop
//! - +/-: volume, m: mute
//! - l: logs
//! - q: quit

mod app;
mod render;

pub(crate) use app::run_tui;
