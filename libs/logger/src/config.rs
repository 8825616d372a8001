use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, JsonSchema, PartialEq)]
/// The output format of the gatekeeper logs.
pub enum LoggerConfigFormat {
  /// Minimal, compact logs. Focuses on the message and its fields, suitable for production environments where log size matters.
  #[serde(rename = "compact")]
  #[schemars(title = "compact")]
  Compact,

  /// Verbose, well-formatted output including code locations. Ideal for development and debugging.
  #[serde(rename = "pretty")]
  #[schemars(title = "pretty")]
  Pretty,

  /// Structured JSON logs, one object per line, for log aggregators and analysis systems.
  #[serde(rename = "json")]
  #[schemars(title = "json")]
  Json,
}

impl Default for LoggerConfigFormat {
  // In development, we wish to see some more details and code locations.
  #[cfg(debug_assertions)]
  fn default() -> Self {
    LoggerConfigFormat::Pretty
  }

  #[cfg(not(debug_assertions))]
  fn default() -> Self {
    if atty::is(atty::Stream::Stdout) {
      LoggerConfigFormat::Compact
    } else {
      LoggerConfigFormat::Json
    }
  }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("unknown logger format \"{0}\", expected one of: compact, pretty, json")]
pub struct UnknownLoggerFormat(pub String);

impl FromStr for LoggerConfigFormat {
  type Err = UnknownLoggerFormat;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "compact" => Ok(LoggerConfigFormat::Compact),
      "pretty" => Ok(LoggerConfigFormat::Pretty),
      "json" => Ok(LoggerConfigFormat::Json),
      other => Err(UnknownLoggerFormat(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_format_names() {
    assert_eq!("json".parse(), Ok(LoggerConfigFormat::Json));
    assert_eq!(" Pretty ".parse(), Ok(LoggerConfigFormat::Pretty));
    assert_eq!(
      "xml".parse::<LoggerConfigFormat>(),
      Err(UnknownLoggerFormat("xml".to_string()))
    );
  }

  #[test]
  fn deserializes_lowercase_names() {
    let format: LoggerConfigFormat = serde_json::from_str("\"compact\"").unwrap();
    assert_eq!(format, LoggerConfigFormat::Compact);
  }
}
