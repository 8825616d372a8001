use crate::config::LoggerConfigFormat;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;
use tracing_subscriber::{
  fmt::{self, format::FmtSpan, time::UtcTime},
  Layer,
};

pub type BoxedLoggerLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builds the root log layer. `print_performance_info` emits a line with timings whenever a span closes.
pub fn build_logger(
  format: &LoggerConfigFormat,
  filter: &str,
  print_performance_info: bool,
) -> Result<BoxedLoggerLayer, tracing_subscriber::filter::ParseError> {
  let timer = UtcTime::rfc_3339();
  let filter = EnvFilter::try_new(filter)?;
  let performance_spans = match print_performance_info {
    true => FmtSpan::CLOSE,
    false => FmtSpan::NONE,
  };

  Ok(match format {
    LoggerConfigFormat::Json => fmt::Layer::<Registry>::default()
      .json()
      .with_timer(timer)
      .with_span_events(performance_spans)
      .with_filter(filter)
      .boxed(),
    LoggerConfigFormat::Pretty => fmt::Layer::<Registry>::default()
      .pretty()
      .with_timer(timer)
      .with_span_events(performance_spans)
      .with_filter(filter)
      .boxed(),
    LoggerConfigFormat::Compact => fmt::Layer::<Registry>::default()
      .compact()
      .with_timer(timer)
      .with_span_events(performance_spans)
      .with_filter(filter)
      .boxed(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builds_every_format() {
    for format in [
      LoggerConfigFormat::Json,
      LoggerConfigFormat::Pretty,
      LoggerConfigFormat::Compact,
    ] {
      assert!(build_logger(&format, "info,admission_control_plugin=debug", true).is_ok());
    }
  }

  #[test]
  fn rejects_invalid_filters() {
    assert!(build_logger(&LoggerConfigFormat::Json, "gatekeeper=notalevel", false).is_err());
  }
}
