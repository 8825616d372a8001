use std::time::Duration;

use gatekeeper_common::graphql::GraphQLError;
use serde_json::{Map, Value};

pub const QUERY_TOO_DEEP: &str = "QUERY_TOO_DEEP";
pub const QUERY_TOO_COMPLEX: &str = "QUERY_TOO_COMPLEX";
pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";

fn window_label(window: &Duration) -> String {
  humantime::format_duration(*window).to_string()
}

fn whole_seconds(duration: &Duration) -> u64 {
  duration.as_secs()
}

/// A single reason to reject a request. The `Display` output is the human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionViolation {
  #[error("Query too deep. Max depth is {max_depth}, but got {actual_depth}. Please simplify your query or split it into multiple requests.")]
  TooDeep {
    max_depth: usize,
    actual_depth: usize,
  },
  #[error("Query too complex. Max complexity is {max_complexity}, but got {actual_complexity}. Please reduce the number of fields or use pagination.")]
  TooComplex {
    max_complexity: u64,
    actual_complexity: u64,
  },
  #[error(
    "Rate limit exceeded. Maximum {limit} requests per {}. Please try again in {} seconds.",
    window_label(.window),
    whole_seconds(.retry_after)
  )]
  RateLimited {
    limit: usize,
    /// Time until the oldest request in the window expires, floored to whole seconds.
    retry_after: Duration,
    window: Duration,
  },
}

impl AdmissionViolation {
  pub fn code(&self) -> &'static str {
    match self {
      AdmissionViolation::TooDeep { .. } => QUERY_TOO_DEEP,
      AdmissionViolation::TooComplex { .. } => QUERY_TOO_COMPLEX,
      AdmissionViolation::RateLimited { .. } => RATE_LIMIT_EXCEEDED,
    }
  }

  pub fn retry_after(&self) -> Option<Duration> {
    match self {
      AdmissionViolation::RateLimited { retry_after, .. } => Some(*retry_after),
      _ => None,
    }
  }

  /// Machine-readable metadata, exposed as the `extensions` of the GraphQL error.
  pub fn extensions(&self) -> Map<String, Value> {
    let mut extensions = Map::new();
    extensions.insert("code".to_string(), Value::from(self.code()));

    match self {
      AdmissionViolation::TooDeep {
        max_depth,
        actual_depth,
      } => {
        extensions.insert("maxDepth".to_string(), Value::from(*max_depth));
        extensions.insert("actualDepth".to_string(), Value::from(*actual_depth));
      }
      AdmissionViolation::TooComplex {
        max_complexity,
        actual_complexity,
      } => {
        extensions.insert("maxComplexity".to_string(), Value::from(*max_complexity));
        extensions.insert(
          "actualComplexity".to_string(),
          Value::from(*actual_complexity),
        );
      }
      AdmissionViolation::RateLimited {
        limit,
        retry_after,
        window,
      } => {
        extensions.insert("limit".to_string(), Value::from(*limit));
        extensions.insert("retryAfter".to_string(), Value::from(whole_seconds(retry_after)));
        extensions.insert("window".to_string(), Value::from(window_label(window)));
      }
    }

    extensions
  }
}

impl From<&AdmissionViolation> for GraphQLError {
  fn from(violation: &AdmissionViolation) -> Self {
    GraphQLError::new_with_extensions(violation.to_string(), violation.extensions())
  }
}

impl From<AdmissionViolation> for GraphQLError {
  fn from(violation: AdmissionViolation) -> Self {
    GraphQLError::from(&violation)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn too_deep_error() {
    let error: GraphQLError = AdmissionViolation::TooDeep {
      max_depth: 5,
      actual_depth: 7,
    }
    .into();

    assert_eq!(
      error.message,
      "Query too deep. Max depth is 5, but got 7. Please simplify your query or split it into multiple requests."
    );
    assert_eq!(
      Value::Object(error.extensions.unwrap()),
      json!({ "code": "QUERY_TOO_DEEP", "maxDepth": 5, "actualDepth": 7 })
    );
  }

  #[test]
  fn too_complex_error() {
    let error: GraphQLError = AdmissionViolation::TooComplex {
      max_complexity: 100,
      actual_complexity: 111,
    }
    .into();

    assert_eq!(error.code(), Some("QUERY_TOO_COMPLEX"));
    assert_eq!(
      Value::Object(error.extensions.unwrap()),
      json!({ "code": "QUERY_TOO_COMPLEX", "maxComplexity": 100, "actualComplexity": 111 })
    );
  }

  #[test]
  fn rate_limited_error() {
    let violation = AdmissionViolation::RateLimited {
      limit: 60,
      retry_after: Duration::from_millis(41_900),
      window: Duration::from_secs(60),
    };

    assert_eq!(violation.retry_after(), Some(Duration::from_millis(41_900)));
    assert_eq!(
      violation.to_string(),
      "Rate limit exceeded. Maximum 60 requests per 1m. Please try again in 41 seconds."
    );
    assert_eq!(
      Value::Object(violation.extensions()),
      json!({ "code": "RATE_LIMIT_EXCEEDED", "limit": 60, "retryAfter": 41, "window": "1m" })
    );
  }
}
