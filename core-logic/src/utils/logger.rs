use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    layer::Context,
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Target used for per-transfer outcome lines and the worker spans that
/// label them
pub const TASK_RESULT_TARGET: &str = "task_result";

/// Span field read by [`WorkerTagLayer`]
pub const WORKER_ID_FIELD: &str = "worker_id";

pub fn setup_logger() -> Option<WorkerGuard> {
    std::fs::create_dir_all("logs").ok();

    // Hourly files; a long run should not grow one file unbounded
    let file_appender = tracing_appender::rolling::hourly("logs", "loadgen");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // File layer: INFO for task_result, WARN for others
    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(TASK_RESULT_TARGET, tracing::Level::INFO)
        .with_default(tracing::Level::WARN);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    // Console layer: INFO for task_result, ERROR for others
    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target(TASK_RESULT_TARGET, tracing::Level::INFO)
        .with_default(tracing::Level::ERROR);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    let installed = tracing_subscriber::registry()
        .with(WorkerTagLayer)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    // Return guard - MUST be kept alive by caller
    installed.ok().map(|_| guard)
}

// --- Worker tagging ---

/// Worker id captured from a `worker` span
#[derive(Debug, Clone, Copy)]
struct WorkerTag(u64);

impl fmt::Display for WorkerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W{:03}", self.0)
    }
}

#[derive(Default)]
struct WorkerIdVisitor {
    worker_id: Option<u64>,
}

impl Visit for WorkerIdVisitor {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == WORKER_ID_FIELD {
            self.worker_id = Some(value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == WORKER_ID_FIELD {
            self.worker_id = u64::try_from(value).ok();
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn fmt::Debug) {}
}

/// Stores a [`WorkerTag`] on every span that carries a `worker_id` field,
/// so formatters can label lines without re-parsing span fields.
pub struct WorkerTagLayer;

impl<S> Layer<S> for WorkerTagLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = WorkerIdVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(worker_id), Some(span)) = (visitor.worker_id, ctx.span(id)) {
            span.extensions_mut().insert(WorkerTag(worker_id));
        }
    }
}

fn worker_tag<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<WorkerTag>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    ctx.event_scope()?.find_map(|span| {
        let extensions = span.extensions();
        extensions.get::<WorkerTag>().copied()
    })
}

// --- Formatters ---

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn message_of(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);
    visitor.message
}

fn colorize(msg: String) -> String {
    if msg.contains("Success") {
        let green_text = Style::new().fg(Color::LightGreen).bold();
        msg.replace("Success", &format!("{}", green_text.paint("Success")))
    } else if msg.contains("Failed") {
        let red_text = Style::new().fg(Color::LightRed).bold();
        msg.replace("Failed", &format!("{}", red_text.paint("Failed")))
    } else {
        msg
    }
}

/// Console lines: `[W003] Status: Success | ...`, coloured by outcome.
pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let dim = Style::new().dimmed();
        let time = Local::now().format("%H:%M:%S");
        write!(writer, "{} ", dim.paint(time.to_string()))?;

        if let Some(tag) = worker_tag(ctx) {
            write!(writer, "{} ", dim.paint(format!("[{}]", tag)))?;
        }

        writeln!(writer, "{}", colorize(message_of(event)))
    }
}

/// File lines: `timestamp | LEVEL | worker | message`, with `main` for
/// events outside any worker.
pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let level = event.metadata().level();
        let worker = worker_tag(ctx)
            .map(|tag| tag.to_string())
            .unwrap_or_else(|| "main".to_string());

        writeln!(
            writer,
            "{} | {:<5} | {:<4} | {}",
            timestamp,
            level,
            worker,
            message_of(event)
        )
    }
}
