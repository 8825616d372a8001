use bytes::Bytes;
use graphql_parser::{
  parse_query,
  query::{Document, ParseError},
};
use mime::{Mime, APPLICATION_JSON};
use serde::{Deserialize, Serialize};
use serde_json::{Error as SerdeError, Map, Value};

use crate::http::{
  extract_accept, extract_content_type, GatekeeperHttpRequest, GatekeeperHttpResponse, StatusCode,
};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GraphQLRequest {
  // The GraphQL operation, as string
  #[serde(rename = "query")]
  pub operation: String,
  // The operation name, if specified
  #[serde(rename = "operationName")]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub operation_name: Option<String>,
  // GraphQL operation variables, in JSON format
  #[serde(default)]
  pub variables: Option<Map<String, Value>>,
  // GraphQL execution extensions, in JSON format
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Map<String, Value>>,
}

#[cfg(feature = "test_utils")]
impl Default for GraphQLRequest {
  fn default() -> Self {
    GraphQLRequest {
      operation: "query { __typename }".to_string(),
      operation_name: None,
      variables: None,
      extensions: None,
    }
  }
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractGraphQLOperationError {
  #[error("invalid content-type header")]
  InvalidContentTypeHeader,
  #[error("invalid body json format")]
  InvalidBodyJsonFormat(SerdeError),
  #[error("failed to parse GraphQL operation")]
  GraphQLParserError(ParseError),
  #[error("failed to locate any GraphQL operation in request")]
  EmptyExtraction,
  #[error("serialization error")]
  SerializationError(SerdeError),
}

impl ExtractGraphQLOperationError {
  pub fn into_response(&self, accept: Option<Mime>) -> GatekeeperHttpResponse {
    let status = match (accept, self) {
      (None, _) => StatusCode::OK,
      // Legacy `application/json` clients expect parse errors with a 200 status code.
      (Some(accept), ExtractGraphQLOperationError::GraphQLParserError(_))
        if accept == APPLICATION_JSON =>
      {
        StatusCode::OK
      }
      _ => StatusCode::BAD_REQUEST,
    };

    GraphQLResponse::new_error(self.to_string().as_str()).into_with_status_code(status)
  }
}

impl GraphQLRequest {
  pub fn new_from_http_post(
    http_request: &GatekeeperHttpRequest,
  ) -> (
    Option<Mime>,
    Result<GraphQLRequest, ExtractGraphQLOperationError>,
  ) {
    // Extract the content-type and default to application/json when it's not set
    // see https://graphql.github.io/graphql-over-http/draft/#sec-POST
    let content_type = extract_content_type(&http_request.headers).unwrap_or(APPLICATION_JSON);
    let accept = extract_accept(&http_request.headers);

    if content_type.type_() != mime::APPLICATION_JSON.type_() {
      return (
        accept,
        Err(ExtractGraphQLOperationError::InvalidContentTypeHeader),
      );
    }

    match http_request.json_body::<GraphQLRequest>() {
      Ok(body) => (accept, Ok(body)),
      Err(e) => (
        accept,
        Err(ExtractGraphQLOperationError::InvalidBodyJsonFormat(e)),
      ),
    }
  }
}

impl From<&GraphQLRequest> for Bytes {
  fn from(request: &GraphQLRequest) -> Self {
    serde_json::to_vec(&request)
      .unwrap_or_else(|e| {
        ExtractGraphQLOperationError::SerializationError(e)
          .to_string()
          .into_bytes()
      })
      .into()
  }
}

/// An error with a message and optional extensions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GraphQLError {
  /// The error message.
  pub message: String,
  /// Extensions to the error.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Map<String, Value>>,
}

impl std::fmt::Display for GraphQLError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.message)
  }
}

impl GraphQLError {
  pub fn new(message: &str) -> Self {
    GraphQLError {
      message: message.to_string(),
      extensions: None,
    }
  }

  pub fn new_with_extensions(message: impl Into<String>, extensions: Map<String, Value>) -> Self {
    GraphQLError {
      message: message.into(),
      extensions: Some(extensions),
    }
  }

  /// The machine-readable `extensions.code` of this error, if any.
  pub fn code(&self) -> Option<&str> {
    self
      .extensions
      .as_ref()
      .and_then(|extensions| extensions.get("code"))
      .and_then(Value::as_str)
  }
}

pub type ParsedGraphQLDocument = Document<'static, String>;

#[derive(Debug)]
pub struct ParsedGraphQLRequest {
  pub request: GraphQLRequest,
  pub parsed_operation: ParsedGraphQLDocument,
}

impl ParsedGraphQLRequest {
  #[tracing::instrument(level = "trace", name = "graphql_parse", skip_all)]
  pub fn create_and_parse(raw_request: GraphQLRequest) -> Result<Self, ParseError> {
    parse_graphql_operation(&raw_request.operation).map(|parsed_operation| ParsedGraphQLRequest {
      request: raw_request,
      parsed_operation,
    })
  }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GraphQLResponse {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors: Option<Vec<GraphQLError>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Value>,
}

impl GraphQLResponse {
  pub fn new_error(error: &str) -> Self {
    GraphQLResponse {
      data: None,
      errors: Some(vec![GraphQLError::new(error)]),
      extensions: None,
    }
  }

  pub fn into_with_status_code(self, code: StatusCode) -> GatekeeperHttpResponse {
    GatekeeperHttpResponse {
      body: self.into(),
      status: code,
      headers: Default::default(),
    }
  }
}

impl From<Vec<GraphQLError>> for GraphQLResponse {
  fn from(errors: Vec<GraphQLError>) -> Self {
    GraphQLResponse {
      data: None,
      errors: Some(errors),
      extensions: None,
    }
  }
}

impl From<GraphQLResponse> for Bytes {
  fn from(response: GraphQLResponse) -> Self {
    serde_json::to_vec(&response)
      .unwrap_or_else(|e| {
        ExtractGraphQLOperationError::SerializationError(e)
          .to_string()
          .into_bytes()
      })
      .into()
  }
}

impl From<GraphQLResponse> for GatekeeperHttpResponse {
  fn from(response: GraphQLResponse) -> Self {
    GatekeeperHttpResponse {
      body: response.into(),
      status: StatusCode::OK,
      headers: Default::default(),
    }
  }
}

pub fn parse_graphql_operation(operation_str: &str) -> Result<ParsedGraphQLDocument, ParseError> {
  parse_query::<String>(operation_str).map(|v| v.into_static())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_error_is_reported() {
    assert!(parse_graphql_operation("{ me { id }").is_err());
  }

  #[test]
  fn error_response_serializes_extensions() {
    let mut extensions = Map::new();
    extensions.insert("code".to_string(), Value::from("SOME_CODE"));
    let error = GraphQLError::new_with_extensions("boom", extensions);
    assert_eq!(error.code(), Some("SOME_CODE"));

    let response: GraphQLResponse = vec![error].into();
    let bytes: Bytes = response.into();
    let value: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(
      value,
      serde_json::json!({ "errors": [{ "message": "boom", "extensions": { "code": "SOME_CODE" } }] })
    );
  }
}
