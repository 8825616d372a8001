use std::str::FromStr;

use anyhow::{anyhow, Result as AnyhowResult};
pub use bytes::Bytes;
use http::{HeaderMap, StatusCode as RawStatusCode};

use http::header::{HeaderName, ACCEPT};
pub use http::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
pub use http::Method;
use mime::Mime;
use serde::de::DeserializeOwned;
use serde_json::from_slice;
pub type StatusCode = RawStatusCode;
pub type HttpHeadersMap = HeaderMap<HeaderValue>;

pub trait ToHeadersMap {
  fn to_headers_map(&self) -> AnyhowResult<HttpHeadersMap>;
}

fn insert_header(headers_map: &mut HttpHeadersMap, key: &str, value: &str) -> AnyhowResult<()> {
  let header_name = HeaderName::from_str(key)
    .map_err(|e| anyhow!("Couldn't parse key into a header name: {}", e))?;
  let header_value = HeaderValue::from_str(value)
    .map_err(|e| anyhow!("Couldn't parse value into a header value: {}", e))?;

  headers_map.insert(header_name, header_value);

  Ok(())
}

impl ToHeadersMap for Vec<(&str, &str)> {
  fn to_headers_map(&self) -> AnyhowResult<HttpHeadersMap> {
    let mut headers_map = HeaderMap::new();

    for (key, value) in self {
      insert_header(&mut headers_map, key, value)?;
    }

    Ok(headers_map)
  }
}

/// The HTTP request as handed over by the transport layer.
#[derive(Debug, Clone)]
pub struct GatekeeperHttpRequest {
  pub headers: HttpHeadersMap,
  pub method: Method,
  pub uri: String,
  pub query_string: String,
  pub body: Bytes,
}

#[cfg(feature = "test_utils")]
impl Default for GatekeeperHttpRequest {
  fn default() -> Self {
    Self {
      headers: HeaderMap::new(),
      method: Method::POST,
      uri: "/graphql".to_string(),
      query_string: "".to_string(),
      body: serde_json::json!({
          "query": "query { __typename }",
      })
      .to_string()
      .into(),
    }
  }
}

impl GatekeeperHttpRequest {
  pub fn json_body<T>(&self) -> Result<T, serde_json::Error>
  where
    T: DeserializeOwned,
  {
    from_slice::<T>(&self.body)
  }

  /// Raw value of the `Authorization` header, if present and valid UTF-8.
  pub fn authorization(&self) -> Option<&str> {
    self
      .headers
      .get(AUTHORIZATION)
      .and_then(|value| value.to_str().ok())
  }
}

#[derive(Debug, Clone)]
pub struct GatekeeperHttpResponse {
  pub body: Bytes,
  pub status: StatusCode,
  pub headers: HttpHeadersMap,
}

impl GatekeeperHttpResponse {
  pub fn json_body<T>(&self) -> Result<T, serde_json::Error>
  where
    T: DeserializeOwned,
  {
    from_slice::<T>(&self.body)
  }
}

pub fn extract_content_type(headers_map: &HttpHeadersMap) -> Option<Mime> {
  headers_map
    .get(CONTENT_TYPE)
    .and_then(|value| value.to_str().ok())
    .and_then(|content_type| content_type.parse().ok())
}

pub fn extract_accept(headers_map: &HttpHeadersMap) -> Option<Mime> {
  headers_map
    .get(ACCEPT)
    .and_then(|value| value.to_str().ok())
    .and_then(|accept| accept.parse().ok())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builds_headers_map_from_pairs() {
    let headers = vec![("Authorization", "Bearer abc"), ("content-type", "application/json")]
      .to_headers_map()
      .unwrap();

    assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc");
    assert_eq!(
      extract_content_type(&headers).unwrap().essence_str(),
      "application/json"
    );
  }

  #[test]
  fn rejects_invalid_header_names() {
    assert!(vec![("bad header", "x")].to_headers_map().is_err());
  }

  #[test]
  fn reads_authorization_header() {
    let request = GatekeeperHttpRequest {
      headers: vec![("authorization", "Bearer token")]
        .to_headers_map()
        .unwrap(),
      method: Method::POST,
      uri: "/graphql".to_string(),
      query_string: "".to_string(),
      body: Bytes::new(),
    };

    assert_eq!(request.authorization(), Some("Bearer token"));
  }
}
