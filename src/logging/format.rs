//! Record framing shared by all log destinations.
//!
//! One [`TierFormat`] instance is built at sink construction and applied
//! identically to stdout and both file tiers, so a record looks the same
//! everywhere it lands. Two framings exist: a tab-separated console line and
//! a one-object-per-line JSON form. The level-encoding style (case and
//! coloring) and the fixed `%Y/%m/%d - %H:%M:%S` timestamp are part of the
//! framing.

use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Timestamp layout applied to every destination.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d - %H:%M:%S";

/// How a record is framed on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    Console,
    Json,
}

/// How the severity label is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LevelEncoding {
    Lowercase,
    LowercaseColor,
    Uppercase,
    UppercaseColor,
}

/// The formatter shared by all three destinations.
#[derive(Clone, Copy)]
pub struct TierFormat {
    format: RecordFormat,
    encode_level: LevelEncoding,
    capture_stacktrace: bool,
}

impl TierFormat {
    pub fn new(
        format: RecordFormat,
        encode_level: LevelEncoding,
        capture_stacktrace: bool,
    ) -> Self {
        TierFormat {
            format,
            encode_level,
            capture_stacktrace,
        }
    }

    fn timestamp() -> String {
        chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
    }

    fn stacktrace(&self) -> Option<String> {
        if self.capture_stacktrace {
            Some(std::backtrace::Backtrace::force_capture().to_string())
        } else {
            None
        }
    }

    fn format_console<S, N>(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
        N: for<'a> FormatFields<'a> + 'static,
    {
        write!(
            writer,
            "{}\t{}\t",
            Self::timestamp(),
            encode_level(*event.metadata().level(), self.encode_level)
        )?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        if let Some(stacktrace) = self.stacktrace() {
            write!(writer, "\n{}", stacktrace.trim_end())?;
        }

        writeln!(writer)
    }

    fn format_json(&self, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut record = visitor.fields;
        record.insert(
            "level".to_string(),
            Value::String(encode_level(*event.metadata().level(), self.encode_level)),
        );
        record.insert("time".to_string(), Value::String(Self::timestamp()));
        record.insert("message".to_string(), Value::String(visitor.message));
        if let Some(stacktrace) = self.stacktrace() {
            record.insert("stacktrace".to_string(), Value::String(stacktrace));
        }

        let line = serde_json::to_string(&Value::Object(record)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

impl<S, N> FormatEvent<S, N> for TierFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        match self.format {
            RecordFormat::Console => self.format_console(ctx, writer, event),
            RecordFormat::Json => self.format_json(writer, event),
        }
    }
}

/// Renders the severity label in the configured style.
fn encode_level(level: Level, encoding: LevelEncoding) -> String {
    let label = match encoding {
        LevelEncoding::Lowercase | LevelEncoding::LowercaseColor => {
            level.to_string().to_lowercase()
        }
        LevelEncoding::Uppercase | LevelEncoding::UppercaseColor => level.to_string(),
    };

    match encoding {
        LevelEncoding::Lowercase | LevelEncoding::Uppercase => label,
        LevelEncoding::LowercaseColor | LevelEncoding::UppercaseColor => {
            level_style(level).paint(label).to_string()
        }
    }
}

fn level_style(level: Level) -> Style {
    match level {
        Level::TRACE => Style::new().fg(Color::Purple),
        Level::DEBUG => Style::new().fg(Color::Blue),
        Level::INFO => Style::new().fg(Color::Green),
        Level::WARN => Style::new().fg(Color::Yellow),
        Level::ERROR => Style::new().fg(Color::Red),
    }
}

/// Collects event fields into a JSON map, pulling `message` out separately.
#[derive(Default)]
struct JsonFieldVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl JsonFieldVisitor {
    fn record(&mut self, field: &Field, value: Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonFieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.record(field, Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.record(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.record(field, Value::String(format!("{:?}", value)));
        }
    }
}
