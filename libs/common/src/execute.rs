use crate::{
  graphql::ParsedGraphQLRequest,
  http::{GatekeeperHttpRequest, GatekeeperHttpResponse},
};

#[derive(Debug)]
pub struct RequestExecutionContext {
  pub downstream_http_request: GatekeeperHttpRequest,
  pub downstream_graphql_request: Option<ParsedGraphQLRequest>,
  pub short_circuit_response: Option<GatekeeperHttpResponse>,
}

impl RequestExecutionContext {
  pub fn new(downstream_http_request: GatekeeperHttpRequest) -> Self {
    RequestExecutionContext {
      downstream_http_request,
      downstream_graphql_request: None,
      short_circuit_response: None,
    }
  }

  pub fn short_circuit(&mut self, response: GatekeeperHttpResponse) {
    self.short_circuit_response = Some(response);
  }

  pub fn is_short_circuit(&self) -> bool {
    self.short_circuit_response.is_some()
  }

  pub fn has_failed_extraction(&self) -> bool {
    self.downstream_graphql_request.is_none()
  }
}
