use std::{sync::Arc, time::Instant};

use graphql_parser::query::{Document, Text};
use tracing::debug;

use crate::{
  complexity::{query_complexity, CostModel},
  config::AdmissionControlPluginConfig,
  depth::query_depth,
  identity::extract_caller_id,
  rate_limiter::RateLimiter,
  violation::AdmissionViolation,
};

/// Runs every admission check for a single operation and collects all violations.
#[derive(Debug)]
pub struct AdmissionController {
  enabled: bool,
  max_depth: usize,
  max_complexity: u64,
  cost_model: CostModel,
  rate_limiter: Arc<RateLimiter>,
}

impl AdmissionController {
  pub fn new(config: &AdmissionControlPluginConfig) -> Self {
    Self {
      enabled: config.enabled,
      max_depth: config.max_depth,
      max_complexity: config.max_complexity,
      cost_model: config.cost_model.clone(),
      rate_limiter: Arc::new(RateLimiter::new(
        config.requests_per_window,
        config.window,
      )),
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  /// Shared handle to the rate-limit state, for the janitor.
  pub fn rate_limiter(&self) -> Arc<RateLimiter> {
    self.rate_limiter.clone()
  }

  pub fn check_depth<'a, T: Text<'a>>(
    &self,
    document: &Document<'a, T>,
  ) -> Option<AdmissionViolation> {
    let actual_depth = query_depth(document);

    (actual_depth > self.max_depth).then_some(AdmissionViolation::TooDeep {
      max_depth: self.max_depth,
      actual_depth,
    })
  }

  pub fn check_complexity<'a, T: Text<'a>>(
    &self,
    document: &Document<'a, T>,
  ) -> Option<AdmissionViolation> {
    let actual_complexity = query_complexity(document, &self.cost_model);

    (actual_complexity > self.max_complexity).then_some(AdmissionViolation::TooComplex {
      max_complexity: self.max_complexity,
      actual_complexity,
    })
  }

  /// Returns every violation of the request, in the order: depth, complexity, rate limit.
  /// An empty list admits the request.
  ///
  /// All checks run even when an earlier one fails. Anonymous callers, and callers whose
  /// credential cannot be decoded, are not rate limited.
  #[tracing::instrument(level = "debug", name = "AdmissionController::admit", skip_all)]
  pub fn admit<'a, T: Text<'a>>(
    &self,
    document: &Document<'a, T>,
    credential_header: Option<&str>,
    now: Instant,
  ) -> Vec<AdmissionViolation> {
    if !self.enabled {
      return vec![];
    }

    let rate_limit_violation = extract_caller_id(credential_header)
      .and_then(|caller_id| self.rate_limiter.check_and_record(&caller_id, now));

    let violations = [
      self.check_depth(document),
      self.check_complexity(document),
      rate_limit_violation,
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();

    debug!(
      violations = violations.len(),
      "admission control checks completed"
    );

    violations
  }
}
