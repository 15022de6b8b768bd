use player_core::catalog::format_duration;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph},
};

use super::app::App;

pub(crate) fn draw(f: &mut ratatui::Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(4),
        ])
        .split(f.area());

    draw_search(f, app, chunks[0]);
    draw_tracks(f, app, chunks[1]);
    draw_controls(f, app, chunks[2]);
    draw_progress(f, app, chunks[3]);
    draw_footer(f, app, chunks[4]);

    if app.logs_open {
        draw_logs(f, app);
    }
}

fn draw_search(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let title = if app.searching {
        format!("Search [{}] (searching...)", app.filter)
    } else {
        format!("Search [{}]", app.filter)
    };
    let style = if app.editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(style);
    let inner = block.inner(area);
    f.render_widget(Paragraph::new(app.query.as_str()).block(block), area);

    if app.editing {
        let x = inner.x + (app.query.chars().count() as u16).min(inner.width.saturating_sub(1));
        f.set_cursor_position((x, inner.y));
    }
}

fn draw_tracks(f: &mut ratatui::Frame, app: &mut App, area: Rect) {
    let playing_id = app.now_playing.as_ref().map(|t| t.id.as_str());
    let items: Vec<ListItem> = if app.tracks.is_empty() {
        vec![ListItem::new("<no results>")]
    } else {
        app.tracks
            .iter()
            .map(|t| {
                let mut title_style = Style::default().add_modifier(Modifier::BOLD);
                if playing_id == Some(t.id.as_str()) {
                    title_style = title_style.fg(Color::Green);
                }
                ListItem::new(vec![
                    Line::from(Span::styled(t.title.clone(), title_style)),
                    Line::from(Span::styled(
                        format!("  {}", t.subtitle()),
                        Style::default().fg(Color::DarkGray),
                    )),
                ])
            })
            .collect()
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Tracks ({})", app.tracks.len()));
    // Two lines per entry.
    app.list_view_height = (block.inner(area).height / 2) as usize;
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, area, &mut app.list_state);
}

fn draw_controls(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let volume = if app.volume.muted() {
        "Volume: muted".to_string()
    } else {
        format!("Volume: {}%", app.volume.percent())
    };
    let line = Line::from(vec![
        Span::styled(
            format!("[ {} ]", app.state.button_label()),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::raw(volume),
    ]);
    f.render_widget(
        Paragraph::new(line).block(Block::default().borders(Borders::ALL).title("Controls")),
        area,
    );
}

fn draw_progress(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let (title, label) = match &app.now_playing {
        Some(track) => {
            let elapsed = track.duration_secs * u64::from(app.progress) / 100;
            (
                format!("Now Playing: {}", track.title),
                format!(
                    "{} / {} ({}%)",
                    format_duration(elapsed),
                    format_duration(track.duration_secs),
                    app.progress
                ),
            )
        }
        None => ("Now Playing: -".to_string(), "-".to_string()),
    };
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
        .percent(u16::from(app.progress.min(100)))
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_footer(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Status");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    f.render_widget(
        Paragraph::new(Line::from(format!("status: {}", app.status))),
        rows[0],
    );
    let keys = if app.editing {
        "keys: type query | Enter search | Esc cancel"
    } else {
        "keys: / search | f filter | ↑/↓ select | Enter play | Space play/pause | s stop | +/- volume | m mute | l logs | q quit"
    };
    f.render_widget(
        Paragraph::new(Line::from(keys)).style(Style::default().fg(Color::DarkGray)),
        rows[1],
    );
}

fn draw_logs(f: &mut ratatui::Frame, app: &App) {
    let area = centered_rect(90, 80, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Logs (Esc to close, ↑/↓ scroll)");
    let inner = block.inner(area);
    let height = inner.height as usize;
    let total = app.logs.len();
    let end = total.saturating_sub(app.logs_scroll);
    let start = end.saturating_sub(height);
    let mut items: Vec<ListItem> = app
        .logs
        .iter()
        .skip(start)
        .take(end - start)
        .map(|line| ListItem::new(line.clone()))
        .collect();
    if items.is_empty() {
        items.push(ListItem::new("<no logs>"));
    }
    f.render_widget(List::new(items).block(block), area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1]);
    horizontal[1]
}
