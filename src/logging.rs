//! Tracing wiring for the pipeline's diagnostic output.
//!
//! Diagnostics go to stderr in the shape `[LEVEL][<stage>] - message`,
//! produced by a custom `tracing_subscriber` formatter. The
//! `stage_info!`/`stage_error!` macros below attach a `stage` field to
//! every event so the formatter always has a stage name to print.

use std::fmt;

use tracing::Level;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

struct StageFormatter;

impl<S, N> FormatEvent<S, N> for StageFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let level = match *event.metadata().level() {
            Level::ERROR => "ERROR",
            Level::WARN => "WARN",
            Level::INFO => "INFO",
            Level::DEBUG => "DEBUG",
            Level::TRACE => "TRACE",
        };

        let mut stage = None;
        let mut visitor = StageVisitor(&mut stage);
        event.record(&mut visitor);

        match stage {
            Some(stage) => write!(writer, "[{level}][{stage}] - ")?,
            None => write!(writer, "[{level}] - ")?,
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

struct StageVisitor<'a>(&'a mut Option<String>);

impl tracing::field::Visit for StageVisitor<'_> {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "stage" {
            *self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "stage" {
            *self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
        }
    }
}

/// Installs the process-wide subscriber. Safe to call once at startup;
/// a second call (e.g. from a test harness that also runs `main`-style
/// setup) is ignored rather than panicking.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(StageFormatter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[macro_export]
macro_rules! stage_info {
    ($stage:expr, $($arg:tt)*) => {
        tracing::info!(stage = %$stage, $($arg)*)
    };
}

#[macro_export]
macro_rules! stage_error {
    ($stage:expr, $($arg:tt)*) => {
        tracing::error!(stage = %$stage, $($arg)*)
    };
}
