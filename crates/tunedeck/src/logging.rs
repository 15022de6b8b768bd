//! Tracing setup that feeds the TUI log pane instead of the terminal.

use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::Subscriber;
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Install the global subscriber. Log lines are delivered on `lines`.
///
/// Call before spawning threads: the local offset can only be read while the process
/// is single-threaded, otherwise timestamps fall back to UTC.
pub fn init(lines: Sender<String>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,player_core=info,tunedeck=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(LogLineLayer::new(lines).with_offset(local_offset()))
        .try_init()
        .context("install tracing subscriber")
}

/// Formats each event as one line and forwards it over a channel.
pub struct LogLineLayer {
    lines: Sender<String>,
    offset: UtcOffset,
}

impl LogLineLayer {
    /// Timestamps are UTC until [`LogLineLayer::with_offset`] says otherwise.
    pub fn new(lines: Sender<String>) -> Self {
        Self {
            lines,
            offset: UtcOffset::UTC,
        }
    }

    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }
}

impl<S> Layer<S> for LogLineLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        let meta = event.metadata();
        let line = format_line(
            clock_hms(OffsetDateTime::now_utc(), self.offset),
            meta.level().as_str(),
            meta.target(),
            visitor.message.as_deref().unwrap_or("event"),
            &visitor.fields,
        );
        let _ = self.lines.send(line);
    }
}

#[derive(Default)]
struct LineVisitor {
    message: Option<String>,
    fields: Vec<String>,
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let formatted = format!("{value:?}");
        if field.name() == "message" {
            self.message = Some(formatted.trim_matches('"').to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), formatted));
        }
    }
}

fn format_line(hms: String, level: &str, target: &str, message: &str, fields: &[String]) -> String {
    let mut line = format!("{hms} {level:<5} {target}: {message}");
    for field in fields {
        line.push(' ');
        line.push_str(field);
    }
    line
}

fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// `now` shifted to `offset`, as `HH:MM:SS`.
fn clock_hms(now: OffsetDateTime, offset: UtcOffset) -> String {
    now.to_offset(offset)
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".to_string())
}
