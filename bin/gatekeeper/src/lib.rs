use gatekeeper_common::{
  graphql::{parse_graphql_operation, GraphQLRequest},
  http::{
    Bytes, GatekeeperHttpRequest, GatekeeperHttpResponse, Method, StatusCode, ToHeadersMap,
    RETRY_AFTER,
  },
  plugin_manager::PluginManager,
};
use gatekeeper_config::{load_config, GatekeeperConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// A single recorded request, one JSON object per line.
#[derive(Deserialize, Debug)]
pub struct ReplayRecord {
  pub query: String,
  #[serde(default, rename = "operationName")]
  pub operation_name: Option<String>,
  #[serde(default)]
  pub variables: Option<Map<String, Value>>,
  /// Raw `Authorization` header value, for example `Bearer <jwt>`.
  #[serde(default)]
  pub authorization: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutcomeKind {
  Admitted,
  Rejected,
  Invalid,
}

/// The admission decision for a single record.
#[derive(Serialize, Debug, PartialEq)]
pub struct ReplayOutcome {
  #[serde(skip)]
  pub kind: OutcomeKind,
  pub line: usize,
  pub status: u16,
  #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
  pub retry_after: Option<u64>,
  pub response: Value,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ReplayStats {
  pub admitted: usize,
  pub rejected: usize,
  pub invalid: usize,
}

/// Loads the config from the given file, or from the environment when no file is given.
pub fn resolve_config(
  config_file_path: Option<&str>,
  get_env_value: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<GatekeeperConfig> {
  let config = match config_file_path {
    Some(path) => load_config(path, get_env_value)?,
    None => GatekeeperConfig::from_env(get_env_value)?,
  };

  Ok(config)
}

fn record_into_http_request(record: ReplayRecord) -> anyhow::Result<GatekeeperHttpRequest> {
  // A query that does not parse makes the record invalid, it is not an admission decision.
  parse_graphql_operation(&record.query)?;

  let mut headers = vec![("content-type", "application/json")];

  if let Some(authorization) = &record.authorization {
    headers.push(("authorization", authorization.as_str()));
  }

  let headers = headers.to_headers_map()?;

  let graphql_request = GraphQLRequest {
    operation: record.query,
    operation_name: record.operation_name,
    variables: record.variables,
    extensions: None,
  };

  Ok(GatekeeperHttpRequest {
    headers,
    method: Method::POST,
    uri: "/graphql".to_string(),
    query_string: "".to_string(),
    body: Bytes::from(&graphql_request),
  })
}

fn outcome_from_response(line: usize, response: GatekeeperHttpResponse) -> ReplayOutcome {
  let retry_after = response
    .headers
    .get(RETRY_AFTER)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.parse().ok());
  let body = response
    .json_body::<Value>()
    .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&response.body).to_string()));

  ReplayOutcome {
    kind: OutcomeKind::Rejected,
    line,
    status: response.status.as_u16(),
    retry_after,
    response: body,
  }
}

/// Runs every admission check on a single line.
pub async fn replay_line(manager: &PluginManager, line: usize, raw: &str) -> ReplayOutcome {
  let request = serde_json::from_str::<ReplayRecord>(raw)
    .map_err(anyhow::Error::from)
    .and_then(record_into_http_request);

  let request = match request {
    Ok(request) => request,
    Err(e) => {
      warn!("skipping invalid record on line {}: {}", line, e);

      return ReplayOutcome {
        kind: OutcomeKind::Invalid,
        line,
        status: StatusCode::BAD_REQUEST.as_u16(),
        retry_after: None,
        response: json!({ "errors": [{ "message": format!("invalid record: {}", e) }] }),
      };
    }
  };

  match manager.run_validation_phase(request).await {
    Ok(_) => ReplayOutcome {
      kind: OutcomeKind::Admitted,
      line,
      status: StatusCode::OK.as_u16(),
      retry_after: None,
      response: json!({ "data": null }),
    },
    Err(response) => outcome_from_response(line, response),
  }
}

/// Reads newline-delimited records and writes one JSON outcome per line, in input order.
pub async fn replay<R, W>(
  manager: &PluginManager,
  reader: R,
  mut writer: W,
) -> anyhow::Result<ReplayStats>
where
  R: AsyncBufRead + Unpin,
  W: AsyncWrite + Unpin,
{
  let mut stats = ReplayStats::default();
  let mut lines = reader.lines();
  let mut line_number = 0;

  while let Some(raw) = lines.next_line().await? {
    line_number += 1;

    if raw.trim().is_empty() {
      continue;
    }

    let outcome = replay_line(manager, line_number, &raw).await;
    debug!(line = line_number, status = outcome.status, "record replayed");

    match outcome.kind {
      OutcomeKind::Admitted => stats.admitted += 1,
      OutcomeKind::Rejected => stats.rejected += 1,
      OutcomeKind::Invalid => stats.invalid += 1,
    }

    let mut serialized = serde_json::to_vec(&outcome)?;
    serialized.push(b'\n');
    writer.write_all(&serialized).await?;
  }

  writer.flush().await?;

  info!(
    admitted = stats.admitted,
    rejected = stats.rejected,
    invalid = stats.invalid,
    "replay completed"
  );

  Ok(stats)
}
