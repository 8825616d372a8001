use tracing::{debug, error};

use crate::{
  execute::RequestExecutionContext,
  graphql::{ExtractGraphQLOperationError, GraphQLRequest, GraphQLResponse, ParsedGraphQLRequest},
  http::{GatekeeperHttpRequest, GatekeeperHttpResponse, Method, StatusCode},
  plugin::{CreatablePlugin, Plugin, PluginError},
};

#[derive(Debug, Default)]
pub struct PluginManager {
  plugins: Vec<Box<dyn Plugin>>,
}

impl PluginManager {
  pub fn new_from_vec(plugins: Vec<Box<dyn Plugin>>) -> Self {
    Self { plugins }
  }

  pub async fn create_plugin<T: CreatablePlugin + 'static>(
    config: T::Config,
  ) -> Result<Box<dyn Plugin>, PluginError> {
    let plugin: Box<dyn Plugin> = T::create(config).await?;

    Ok(plugin)
  }

  #[tracing::instrument(level = "debug", skip(self, context))]
  pub async fn on_downstream_http_request(&self, context: &mut RequestExecutionContext) {
    for plugin in self.plugins.iter() {
      plugin.on_downstream_http_request(context).await;

      if context.is_short_circuit() {
        return;
      }
    }
  }

  #[tracing::instrument(level = "debug", skip(self, context))]
  pub async fn on_downstream_graphql_request(&self, context: &mut RequestExecutionContext) {
    for plugin in self.plugins.iter() {
      plugin.on_downstream_graphql_request(context).await;

      if context.is_short_circuit() {
        return;
      }
    }
  }

  #[tracing::instrument(level = "debug", skip(self, context, response))]
  pub fn on_downstream_http_response(
    &self,
    context: &mut RequestExecutionContext,
    response: &mut GatekeeperHttpResponse,
  ) {
    for plugin in self.plugins.iter() {
      plugin.on_downstream_http_response(context, response);
    }
  }

  fn finish_short_circuit(
    &self,
    context: &mut RequestExecutionContext,
  ) -> Option<GatekeeperHttpResponse> {
    let mut response = context.short_circuit_response.take()?;
    self.on_downstream_http_response(context, &mut response);

    Some(response)
  }

  /// Runs everything that happens before execution: request hooks, GraphQL extraction and the
  /// validation hooks. `Ok` hands the context over to execution, `Err` is the final response.
  #[tracing::instrument(level = "debug", name = "PluginManager::run_validation_phase", skip_all)]
  pub async fn run_validation_phase(
    &self,
    request: GatekeeperHttpRequest,
  ) -> Result<RequestExecutionContext, GatekeeperHttpResponse> {
    let mut request_ctx = RequestExecutionContext::new(request);

    // Step 1: Trigger "on_downstream_http_request" on all plugins
    self.on_downstream_http_request(&mut request_ctx).await;

    if let Some(response) = self.finish_short_circuit(&mut request_ctx) {
      return Err(response);
    }

    // Step 2: Default handling flow for GraphQL request using POST
    if request_ctx.downstream_graphql_request.is_none()
      && request_ctx.downstream_http_request.method == Method::POST
    {
      debug!("captured POST request, trying to handle as GraphQL POST flow");
      let (accept, result) = GraphQLRequest::new_from_http_post(&request_ctx.downstream_http_request);

      let extraction_error = match result {
        Ok(gql_request) => match ParsedGraphQLRequest::create_and_parse(gql_request) {
          Ok(parsed) => {
            request_ctx.downstream_graphql_request = Some(parsed);
            None
          }
          Err(e) => Some(ExtractGraphQLOperationError::GraphQLParserError(e)),
        },
        Err(e) => {
          error!(
            "error while trying to extract GraphQL request from POST request: {:?}",
            e
          );
          Some(e)
        }
      };

      if let Some(e) = extraction_error {
        let mut error_response = e.into_response(accept);
        self.on_downstream_http_response(&mut request_ctx, &mut error_response);

        return Err(error_response);
      }
    }

    if request_ctx.has_failed_extraction() {
      let mut error_response =
        GraphQLResponse::new_error(&ExtractGraphQLOperationError::EmptyExtraction.to_string())
          .into_with_status_code(StatusCode::BAD_REQUEST);
      self.on_downstream_http_response(&mut request_ctx, &mut error_response);

      return Err(error_response);
    }

    // Step 3: Validation phase on the extracted GraphQL request.
    self.on_downstream_graphql_request(&mut request_ctx).await;

    match self.finish_short_circuit(&mut request_ctx) {
      Some(response) => Err(response),
      None => Ok(request_ctx),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::{Bytes, HttpHeadersMap};
  use graphql_parser::query::{Definition, OperationDefinition};

  #[derive(Debug)]
  struct RejectMutations;

  #[async_trait::async_trait(?Send)]
  impl Plugin for RejectMutations {
    async fn on_downstream_graphql_request(&self, ctx: &mut RequestExecutionContext) {
      let has_mutation = ctx
        .downstream_graphql_request
        .iter()
        .flat_map(|request| request.parsed_operation.definitions.iter())
        .any(|definition| {
          matches!(
            definition,
            Definition::Operation(OperationDefinition::Mutation(_))
          )
        });

      if has_mutation {
        ctx.short_circuit(GraphQLResponse::new_error("no mutations").into());
      }
    }
  }

  fn post(body: &str) -> GatekeeperHttpRequest {
    GatekeeperHttpRequest {
      headers: HttpHeadersMap::new(),
      method: Method::POST,
      uri: "/graphql".to_string(),
      query_string: "".to_string(),
      body: Bytes::from(body.to_string()),
    }
  }

  #[tokio::test]
  async fn passes_valid_requests_to_execution() {
    let manager = PluginManager::new_from_vec(vec![Box::new(RejectMutations)]);
    let ctx = manager
      .run_validation_phase(post(r#"{"query": "{ me { id } }"}"#))
      .await
      .unwrap();

    assert!(ctx.downstream_graphql_request.is_some());
  }

  #[tokio::test]
  async fn short_circuits_from_validation_plugins() {
    let manager = PluginManager::new_from_vec(vec![Box::new(RejectMutations)]);
    let response = manager
      .run_validation_phase(post(r#"{"query": "mutation { logout }"}"#))
      .await
      .unwrap_err();

    let body: GraphQLResponse = response.json_body().unwrap();
    assert_eq!(body.errors.unwrap()[0].message, "no mutations");
  }

  #[tokio::test]
  async fn rejects_unparsable_operations() {
    let manager = PluginManager::default();
    let response = manager
      .run_validation_phase(post(r#"{"query": "{ me { id }"}"#))
      .await
      .unwrap_err();

    assert_eq!(response.status, StatusCode::OK);
  }

  #[tokio::test]
  async fn rejects_requests_without_operation() {
    let mut request = post("");
    request.method = Method::GET;
    let response = PluginManager::default()
      .run_validation_phase(request)
      .await
      .unwrap_err();

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
  }
}
