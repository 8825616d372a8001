pub mod interpolate;

use std::{fs::read_to_string, path::Path};

use gatekeeper_logger::config::{LoggerConfigFormat, UnknownLoggerFormat};
use interpolate::interpolate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const LOG_FILTER_ENV: &str = "LOG_FILTER";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// This section describes the top-level configuration object for the Gatekeeper.
///
/// Gatekeeper supports both YAML and JSON format for the configuration file.
///
/// ## Loading the config file
///
/// Pass the configuration file path as the first argument of the binary:
///
/// ```sh
///
/// gatekeeper my-config-file.yaml
///
/// ```
///
/// > Without a config file, the configuration is read from the environment variables: `MAX_QUERY_DEPTH`, `MAX_QUERY_COMPLEXITY`, `USER_RATE_LIMIT`, `ENABLE_THROTTLING`, `LOG_FILTER` and `LOG_FORMAT`.
///
/// ### Configuration Interpolation with Environment Variables
///
/// Environment variables can be inserted into the config file before it is parsed:
///
/// - Use `${VAR_NAME}` to insert the value of an environment variable. Unknown variables are replaced with an empty string and reported as a warning.
/// - Use `${VAR_NAME:-default}` to fall back to `default` when `VAR_NAME` is unset or empty.
/// - Use `${VAR_NAME:?message}` to fail loading the config when `VAR_NAME` is unset or empty.
/// - Use `$$` for a literal dollar sign.
///
/// Example:
///
/// ```yaml filename="config.yaml"
///
/// admission_control:
///   max_depth: ${MAX_QUERY_DEPTH:-5}
///
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, Default, PartialEq)]
pub struct GatekeeperConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  /// Gatekeeper logger configuration.
  pub logger: Option<LoggerConfig>,
  #[serde(default)]
  /// Depth, complexity and rate limits applied to every incoming GraphQL operation.
  pub admission_control: admission_control_plugin::Config,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq)]
pub struct LoggerConfig {
  /// Environment filter configuration as a string.
  ///
  /// The `filter` can specify various directives to filter logs based on module paths, span names,
  /// and specific fields. These directives can also be combined using commas as a separator.
  ///
  /// - `info` (logs all messages at info level and higher across all modules)
  ///
  /// - `info,admission_control_plugin=debug` (also logs every admission decision)
  ///
  /// See [tracing_subscriber::EnvFilter](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html) for more information.
  #[serde(default = "default_log_filter")]
  pub filter: String,
  /// Configured the logger format. See options below.
  ///
  /// - `pretty` format is human-readable, ideal for development and debugging.
  ///
  /// - `compact` format is minimal, one line per event.
  ///
  /// - `json` format is structured, suitable for production environments and log analysis tools.
  #[serde(default)]
  pub format: LoggerConfigFormat,
  /// Emits timing information when spans are closed.
  #[serde(default)]
  pub print_performance_info: bool,
}

impl Default for LoggerConfig {
  fn default() -> Self {
    Self {
      filter: default_log_filter(),
      format: LoggerConfigFormat::default(),
      print_performance_info: false,
    }
  }
}

fn default_log_filter() -> String {
  "info".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file \"{path}\": {source}")]
  ReadFile {
    path: String,
    source: std::io::Error,
  },
  #[error("unsupported config file \"{0}\", expected a .json, .yaml or .yml extension")]
  UnsupportedFormat(String),
  #[error("failed to interpolate config file: {}", .0.join(", "))]
  Interpolation(Vec<String>),
  #[error("failed to parse JSON config: {0}")]
  Json(#[from] serde_json::Error),
  #[error("failed to parse YAML config: {0}")]
  Yaml(#[from] serde_yaml::Error),
  #[error(transparent)]
  LoggerFormat(#[from] UnknownLoggerFormat),
  #[error("invalid admission_control config: {0}")]
  AdmissionControl(#[from] admission_control_plugin::ConfigError),
}

impl LoggerConfig {
  /// Reads `LOG_FILTER` and `LOG_FORMAT`, falling back to defaults.
  pub fn from_env(get_env_value: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    let mut config = Self::default();

    if let Some(filter) = get_env_value(LOG_FILTER_ENV) {
      config.filter = filter;
    }

    if let Some(format) = get_env_value(LOG_FORMAT_ENV) {
      config.format = format.parse()?;
    }

    Ok(config)
  }
}

impl GatekeeperConfig {
  pub fn from_env(get_env_value: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
    Ok(Self {
      logger: Some(LoggerConfig::from_env(&get_env_value)?),
      admission_control: admission_control_plugin::Config::from_env(&get_env_value)?,
    })
  }
}

#[tracing::instrument(level = "trace", skip(get_env_value))]
pub fn load_config(
  file_path: &str,
  get_env_value: impl Fn(&str) -> Option<String>,
) -> Result<GatekeeperConfig, ConfigError> {
  let path = Path::new(file_path);
  let format = ConfigFormat::from_path(path)?;
  let raw_contents = read_to_string(path).map_err(|source| ConfigError::ReadFile {
    path: file_path.to_string(),
    source,
  })?;

  parse_config_contents(raw_contents, format, get_env_value)
}

pub fn parse_config_contents(
  contents: String,
  format: ConfigFormat,
  get_env_value: impl Fn(&str) -> Option<String>,
) -> Result<GatekeeperConfig, ConfigError> {
  let (config_string, warnings) =
    interpolate(&contents, get_env_value).map_err(ConfigError::Interpolation)?;

  for warning in warnings {
    warn!("config interpolation: {}", warning);
  }

  let config = match format {
    ConfigFormat::Json => parse_config_from_json(&config_string)?,
    ConfigFormat::Yaml => parse_config_from_yaml(&config_string)?,
  };

  config.admission_control.validate()?;

  Ok(config)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
  Json,
  Yaml,
}

impl ConfigFormat {
  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
      Some("json") => Ok(ConfigFormat::Json),
      Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
      _ => Err(ConfigError::UnsupportedFormat(
        path.to_string_lossy().to_string(),
      )),
    }
  }
}

fn parse_config_from_yaml(contents: &str) -> Result<GatekeeperConfig, serde_yaml::Error> {
  serde_yaml::from_str::<GatekeeperConfig>(contents)
}

fn parse_config_from_json(contents: &str) -> Result<GatekeeperConfig, serde_json::Error> {
  serde_json::from_str::<GatekeeperConfig>(contents)
}

#[cfg(test)]
mod tests {
  use std::{io::Write, time::Duration};

  use super::*;

  fn no_env(_: &str) -> Option<String> {
    None
  }

  #[test]
  fn detects_format_from_extension() {
    assert_eq!(
      ConfigFormat::from_path(Path::new("config.json")).unwrap(),
      ConfigFormat::Json
    );
    assert_eq!(
      ConfigFormat::from_path(Path::new("a/b/config.yml")).unwrap(),
      ConfigFormat::Yaml
    );
    assert!(matches!(
      ConfigFormat::from_path(Path::new("config.toml")),
      Err(ConfigError::UnsupportedFormat(_))
    ));
    assert!(ConfigFormat::from_path(Path::new("config")).is_err());
  }

  #[test]
  fn parses_yaml_with_interpolation() {
    let contents = r#"
logger:
  filter: ${LOG_FILTER:-warn}
  format: json
admission_control:
  max_depth: ${DEPTH}
  window: 30s
  janitor:
    interval: 10m
"#;
    let config = parse_config_contents(contents.to_string(), ConfigFormat::Yaml, |key| {
      match key {
        "DEPTH" => Some("8".to_string()),
        _ => None,
      }
    })
    .unwrap();

    let logger = config.logger.unwrap();
    assert_eq!(logger.filter, "warn");
    assert_eq!(logger.format, LoggerConfigFormat::Json);
    assert_eq!(config.admission_control.max_depth, 8);
    assert_eq!(config.admission_control.max_complexity, 100);
    assert_eq!(config.admission_control.window, Duration::from_secs(30));
    assert_eq!(
      config.admission_control.janitor.interval,
      Duration::from_secs(600)
    );
  }

  #[test]
  fn parses_empty_json_as_defaults() {
    let config = parse_config_contents("{}".to_string(), ConfigFormat::Json, no_env).unwrap();

    assert_eq!(config, GatekeeperConfig::default());
  }

  #[test]
  fn rejects_invalid_limits() {
    let result = parse_config_contents(
      r#"{ "admission_control": { "requests_per_window": 0 } }"#.to_string(),
      ConfigFormat::Json,
      no_env,
    );

    assert!(matches!(result, Err(ConfigError::AdmissionControl(_))));
  }

  #[test]
  fn reports_interpolation_errors() {
    let result = parse_config_contents(
      "admission_control:\n  max_depth: ${DEPTH:?required}".to_string(),
      ConfigFormat::Yaml,
      no_env,
    );

    assert!(matches!(result, Err(ConfigError::Interpolation(errors)) if errors.len() == 1));
  }

  #[test]
  fn loads_config_file() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
      file,
      r#"{{ "admission_control": {{ "enabled": false, "max_complexity": 42 }} }}"#
    )
    .unwrap();

    let config = load_config(file.path().to_str().unwrap(), no_env).unwrap();

    assert!(!config.admission_control.enabled);
    assert_eq!(config.admission_control.max_complexity, 42);
    assert!(matches!(
      load_config("/does/not/exist.yaml", no_env),
      Err(ConfigError::ReadFile { .. })
    ));
  }

  #[test]
  fn reads_environment() {
    let config = GatekeeperConfig::from_env(|key| match key {
      "LOG_FORMAT" => Some("compact".to_string()),
      "MAX_QUERY_DEPTH" => Some("9".to_string()),
      _ => None,
    })
    .unwrap();

    assert_eq!(config.logger.unwrap().format, LoggerConfigFormat::Compact);
    assert_eq!(config.admission_control.max_depth, 9);

    assert!(matches!(
      GatekeeperConfig::from_env(|key| match key {
        "LOG_FORMAT" => Some("xml".to_string()),
        _ => None,
      }),
      Err(ConfigError::LoggerFormat(_))
    ));
  }
}
