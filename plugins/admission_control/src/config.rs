use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MAX_QUERY_DEPTH_ENV: &str = "MAX_QUERY_DEPTH";
pub const MAX_QUERY_COMPLEXITY_ENV: &str = "MAX_QUERY_COMPLEXITY";
pub const USER_RATE_LIMIT_ENV: &str = "USER_RATE_LIMIT";
pub const ENABLE_THROTTLING_ENV: &str = "ENABLE_THROTTLING";

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq)]
#[schemars(example = "admission_control_example")]
/// The `admission_control` plugin screens incoming GraphQL operations before they are executed.
///
/// Every operation is checked for:
///
/// - its maximum selection depth (`QUERY_TOO_DEEP`)
///
/// - its estimated cost, based on a fan-out heuristic (`QUERY_TOO_COMPLEX`)
///
/// - the number of requests the caller sent within a sliding window (`RATE_LIMIT_EXCEEDED`)
///
/// All violations found for a request are reported together in the `errors` list of the response.
///
/// The caller identity used for rate limiting is read from the `Authorization: Bearer <jwt>` header **without verifying the token signature**.
/// It is a bucketing hint, not an authentication mechanism: your upstream services remain responsible for authenticating requests.
/// Requests without a decodable token are not rate limited.
pub struct AdmissionControlPluginConfig {
  /// Enables all checks. When disabled, every request is admitted without any computation (useful for local development).
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  /// Maximum allowed depth of field selections. A single top-level field has depth 1.
  #[serde(default = "default_max_depth")]
  pub max_depth: usize,
  /// Maximum allowed complexity score of an operation.
  #[serde(default = "default_max_complexity")]
  pub max_complexity: u64,
  /// Number of requests a single caller can send within `window`.
  #[serde(default = "default_requests_per_window")]
  pub requests_per_window: usize,
  /// Length of the sliding rate-limit window, in human-readable format (for example: `1m`, `30s`).
  #[serde(default = "default_window", with = "humantime_serde")]
  #[schemars(with = "String")]
  pub window: Duration,
  /// Weights used to compute the complexity score.
  #[serde(default)]
  pub cost_model: CostModelConfig,
  /// Background cleanup of rate-limit history for callers that stopped sending requests.
  #[serde(default)]
  pub janitor: JanitorConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq)]
pub struct CostModelConfig {
  /// Cost of a field in a query operation.
  #[serde(default = "default_query_field_cost")]
  pub query_field_cost: u64,
  /// Cost of a field in a mutation operation.
  #[serde(default = "default_mutation_field_cost")]
  pub mutation_field_cost: u64,
  /// Assumed list size of a field that has a nested selection set. The field cost is multiplied by this value.
  #[serde(default = "default_list_size")]
  pub default_list_size: u64,
  /// Arguments that are trusted as an explicit list size. A literal integer value of one of these arguments replaces the field cost.
  #[serde(default = "default_pagination_arguments")]
  pub pagination_arguments: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq)]
pub struct JanitorConfig {
  /// Runs the periodic cleanup task.
  #[serde(default = "default_enabled")]
  pub enabled: bool,
  /// How often the cleanup runs.
  #[serde(default = "default_janitor_interval", with = "humantime_serde")]
  #[schemars(with = "String")]
  pub interval: Duration,
  /// History entries older than this are dropped, and callers without history are forgotten.
  #[serde(default = "default_stale_horizon", with = "humantime_serde")]
  #[schemars(with = "String")]
  pub stale_horizon: Duration,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AdmissionConfigError {
  #[error("invalid value {value:?} for environment variable {name}: expected {expected}")]
  InvalidEnvValue {
    name: &'static str,
    value: String,
    expected: &'static str,
  },
  #[error("\"{0}\" must be greater than zero")]
  MustBePositive(&'static str),
}

impl Default for AdmissionControlPluginConfig {
  fn default() -> Self {
    Self {
      enabled: default_enabled(),
      max_depth: default_max_depth(),
      max_complexity: default_max_complexity(),
      requests_per_window: default_requests_per_window(),
      window: default_window(),
      cost_model: CostModelConfig::default(),
      janitor: JanitorConfig::default(),
    }
  }
}

impl Default for CostModelConfig {
  fn default() -> Self {
    Self {
      query_field_cost: default_query_field_cost(),
      mutation_field_cost: default_mutation_field_cost(),
      default_list_size: default_list_size(),
      pagination_arguments: default_pagination_arguments(),
    }
  }
}

impl Default for JanitorConfig {
  fn default() -> Self {
    Self {
      enabled: default_enabled(),
      interval: default_janitor_interval(),
      stale_horizon: default_stale_horizon(),
    }
  }
}

impl AdmissionControlPluginConfig {
  /// Builds the config from environment variables, falling back to defaults for unset ones.
  ///
  /// Reads `MAX_QUERY_DEPTH`, `MAX_QUERY_COMPLEXITY`, `USER_RATE_LIMIT` (requests per 1 minute window) and `ENABLE_THROTTLING`.
  pub fn from_env(
    get_env_value: impl Fn(&str) -> Option<String>,
  ) -> Result<Self, AdmissionConfigError> {
    let mut config = Self::default();

    if let Some(value) = get_env_value(MAX_QUERY_DEPTH_ENV) {
      config.max_depth = parse_env_number(MAX_QUERY_DEPTH_ENV, &value)?;
    }

    if let Some(value) = get_env_value(MAX_QUERY_COMPLEXITY_ENV) {
      config.max_complexity = parse_env_number(MAX_QUERY_COMPLEXITY_ENV, &value)?;
    }

    if let Some(value) = get_env_value(USER_RATE_LIMIT_ENV) {
      config.requests_per_window = parse_env_number(USER_RATE_LIMIT_ENV, &value)?;
    }

    if let Some(value) = get_env_value(ENABLE_THROTTLING_ENV) {
      config.enabled = parse_env_bool(ENABLE_THROTTLING_ENV, &value)?;
    }

    config.validate()?;

    Ok(config)
  }

  pub fn validate(&self) -> Result<(), AdmissionConfigError> {
    if self.requests_per_window == 0 {
      return Err(AdmissionConfigError::MustBePositive("requests_per_window"));
    }

    if self.window.is_zero() {
      return Err(AdmissionConfigError::MustBePositive("window"));
    }

    if self.janitor.enabled && self.janitor.interval.is_zero() {
      return Err(AdmissionConfigError::MustBePositive("janitor.interval"));
    }

    Ok(())
  }
}

fn parse_env_number<T: std::str::FromStr>(
  name: &'static str,
  value: &str,
) -> Result<T, AdmissionConfigError> {
  value
    .trim()
    .parse::<T>()
    .map_err(|_| AdmissionConfigError::InvalidEnvValue {
      name,
      value: value.to_string(),
      expected: "a non-negative integer",
    })
}

fn parse_env_bool(name: &'static str, value: &str) -> Result<bool, AdmissionConfigError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "true" | "1" | "yes" | "on" => Ok(true),
    "false" | "0" | "no" | "off" => Ok(false),
    _ => Err(AdmissionConfigError::InvalidEnvValue {
      name,
      value: value.to_string(),
      expected: "a boolean",
    }),
  }
}

fn default_enabled() -> bool {
  true
}

fn default_max_depth() -> usize {
  5
}

fn default_max_complexity() -> u64 {
  100
}

fn default_requests_per_window() -> usize {
  60
}

fn default_window() -> Duration {
  Duration::from_secs(60)
}

fn default_query_field_cost() -> u64 {
  1
}

fn default_mutation_field_cost() -> u64 {
  5
}

fn default_list_size() -> u64 {
  10
}

fn default_pagination_arguments() -> Vec<String> {
  vec!["first".to_string(), "limit".to_string()]
}

fn default_janitor_interval() -> Duration {
  Duration::from_secs(60 * 60)
}

fn default_stale_horizon() -> Duration {
  Duration::from_secs(60 * 60)
}

fn admission_control_example() -> AdmissionControlPluginConfig {
  AdmissionControlPluginConfig {
    max_depth: 7,
    max_complexity: 500,
    requests_per_window: 120,
    ..Default::default()
  }
}
