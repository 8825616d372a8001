use gatekeeper_common::{
  graphql::GraphQLRequest,
  http::{
    GatekeeperHttpRequest, GatekeeperHttpResponse, HttpHeadersMap, Method, StatusCode,
    AUTHORIZATION, CONTENT_TYPE,
  },
  plugin::Plugin,
  plugin_manager::PluginManager,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

/// Runs requests through the validation phase of the given plugins. Requests that pass are
/// answered with a fixed upstream response.
#[derive(Debug, Default)]
pub struct TestSuite {
  pub plugins: Vec<Box<dyn Plugin>>,
}

pub fn upstream_response() -> Value {
  json!({
    "data": {
      "__typename": "Query"
    }
  })
}

/// Mints an HS256 token with the given claims. The signature is never checked by the gateway.
pub fn bearer_token(claims: Value) -> String {
  let token = encode(
    &Header::default(),
    &claims,
    &EncodingKey::from_secret(b"e2e-secret"),
  )
  .unwrap();

  format!("Bearer {}", token)
}

impl TestSuite {
  pub fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
    Self { plugins }
  }

  pub fn into_manager(self) -> PluginManager {
    PluginManager::new_from_vec(self.plugins)
  }

  pub async fn run_http_request(
    manager: &PluginManager,
    request: GatekeeperHttpRequest,
  ) -> GatekeeperHttpResponse {
    match manager.run_validation_phase(request).await {
      Ok(mut ctx) => {
        let mut response = GatekeeperHttpResponse {
          body: upstream_response().to_string().into(),
          status: StatusCode::OK,
          headers: HttpHeadersMap::new(),
        };
        manager.on_downstream_http_response(&mut ctx, &mut response);

        response
      }
      Err(response) => response,
    }
  }

  pub async fn run_graphql_request(
    manager: &PluginManager,
    request: GraphQLRequest,
    authorization: Option<&str>,
  ) -> GatekeeperHttpResponse {
    let mut headers = HttpHeadersMap::new();
    headers.append(CONTENT_TYPE, "application/json".parse().unwrap());

    if let Some(authorization) = authorization {
      headers.append(AUTHORIZATION, authorization.parse().unwrap());
    }

    let request = GatekeeperHttpRequest {
      method: Method::POST,
      query_string: "".to_string(),
      uri: "/graphql".to_string(),
      body: serde_json::to_vec(&request).unwrap().into(),
      headers,
    };

    Self::run_http_request(manager, request).await
  }

  pub async fn run_query(
    manager: &PluginManager,
    query: &str,
    authorization: Option<&str>,
  ) -> GatekeeperHttpResponse {
    Self::run_graphql_request(
      manager,
      GraphQLRequest {
        operation: query.to_string(),
        ..Default::default()
      },
      authorization,
    )
    .await
  }
}
