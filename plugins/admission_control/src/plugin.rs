use std::time::Instant;

use crate::{
  config::AdmissionControlPluginConfig, controller::AdmissionController,
  janitor::StateJanitor, violation::AdmissionViolation,
};
use gatekeeper_common::{
  execute::RequestExecutionContext,
  graphql::{GraphQLError, GraphQLResponse},
  http::{GatekeeperHttpResponse, HeaderValue, StatusCode, RETRY_AFTER},
  plugin::{CreatablePlugin, Plugin, PluginError},
};
use tracing::{error, warn};

#[derive(Debug)]
pub struct AdmissionControlPlugin {
  controller: AdmissionController,
  janitor: Option<StateJanitor>,
}

impl AdmissionControlPlugin {
  pub fn new_from_config(config: AdmissionControlPluginConfig) -> Self {
    let controller = AdmissionController::new(&config);
    let janitor = match controller.is_enabled() && config.janitor.enabled {
      true => StateJanitor::try_spawn(
        controller.rate_limiter(),
        config.janitor.interval,
        config.janitor.stale_horizon,
      ),
      false => None,
    };

    Self {
      controller,
      janitor,
    }
  }

  pub fn controller(&self) -> &AdmissionController {
    &self.controller
  }

  pub fn has_janitor(&self) -> bool {
    self
      .janitor
      .as_ref()
      .map(|janitor| janitor.is_running())
      .unwrap_or(false)
  }

  /// Builds the rejection response for a non-empty list of violations.
  pub fn rejection_response(violations: &[AdmissionViolation]) -> GatekeeperHttpResponse {
    let retry_after = violations
      .iter()
      .filter_map(|violation| violation.retry_after())
      .max();
    let status = match retry_after {
      Some(_) => StatusCode::TOO_MANY_REQUESTS,
      None => StatusCode::BAD_REQUEST,
    };

    let errors = violations
      .iter()
      .map(GraphQLError::from)
      .collect::<Vec<_>>();
    let mut response = GraphQLResponse::from(errors).into_with_status_code(status);

    if let Some(retry_after) = retry_after {
      response
        .headers
        .insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
    }

    response
  }
}

#[async_trait::async_trait(?Send)]
impl CreatablePlugin for AdmissionControlPlugin {
  type Config = AdmissionControlPluginConfig;

  async fn create(config: Self::Config) -> Result<Box<Self>, PluginError> {
    if let Err(e) = config.validate() {
      return Err(PluginError::InitError {
        source: anyhow::anyhow!("invalid admission control config: {}", e),
      });
    }

    Ok(Box::new(Self::new_from_config(config)))
  }
}

#[async_trait::async_trait(?Send)]
impl Plugin for AdmissionControlPlugin {
  async fn on_downstream_graphql_request(&self, ctx: &mut RequestExecutionContext) {
    let credential_header = ctx.downstream_http_request.authorization();

    let violations = match &ctx.downstream_graphql_request {
      Some(request) => {
        self
          .controller
          .admit(&request.parsed_operation, credential_header, Instant::now())
      }
      None => {
        error!("admission control was called without a parsed GraphQL operation, skipping");
        return;
      }
    };

    if violations.is_empty() {
      return;
    }

    warn!(
      codes = ?violations.iter().map(|v| v.code()).collect::<Vec<_>>(),
      "admission control rejected the request"
    );

    ctx.short_circuit(Self::rejection_response(&violations));
  }
}
