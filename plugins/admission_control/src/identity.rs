//! Best-effort caller identification for rate limiting.
//!
//! **This is not a security control.** Tokens are decoded without verifying their signature,
//! so anyone can claim any identity. The result is only used to pick a rate-limit bucket;
//! authentication belongs to the upstream services.

use std::fmt::{Display, Formatter};

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::Value;
use tracing::warn;

const BEARER_PREFIX: &str = "Bearer ";
const USER_ID_CLAIM: &str = "user_id";
const SUBJECT_CLAIM: &str = "sub";

/// Opaque identifier of a caller, used as a rate-limit bucket key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerId(String);

impl CallerId {
  pub fn new(id: impl Into<String>) -> Self {
    CallerId(id.into())
  }
}

impl Display for CallerId {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
  #[error("empty credential")]
  EmptyCredential,
  #[error("failed to decode token: {0}")]
  MalformedToken(jsonwebtoken::errors::Error),
  #[error("token has no usable \"user_id\" or \"sub\" claim")]
  MissingClaims,
}

fn unverified_validation() -> Validation {
  let mut validation = Validation::default();
  validation.insecure_disable_signature_validation();
  validation.validate_exp = false;
  validation.validate_nbf = false;
  validation.validate_aud = false;
  validation.required_spec_claims.clear();

  validation
}

fn claim_as_id(claim: Option<&Value>) -> Option<String> {
  match claim? {
    Value::String(id) if !id.is_empty() => Some(id.clone()),
    Value::Number(id) => Some(id.to_string()),
    _ => None,
  }
}

/// Decodes the claims of a bearer credential and picks the caller id, `user_id` first, then `sub`.
///
/// Tokens with `"alg": "none"` have no supported header and fail to decode.
pub(crate) fn decode_caller_id(credential: &str) -> Result<CallerId, IdentityError> {
  let token = credential
    .strip_prefix(BEARER_PREFIX)
    .unwrap_or(credential)
    .trim();

  if token.is_empty() {
    return Err(IdentityError::EmptyCredential);
  }

  let claims = decode::<Value>(token, &DecodingKey::from_secret(&[]), &unverified_validation())
    .map_err(IdentityError::MalformedToken)?
    .claims;

  claim_as_id(claims.get(USER_ID_CLAIM))
    .or_else(|| claim_as_id(claims.get(SUBJECT_CLAIM)))
    .map(CallerId)
    .ok_or(IdentityError::MissingClaims)
}

/// Derives the caller id from the raw `Authorization` header value.
///
/// Returns `None` for anonymous callers and for any credential that cannot be decoded.
/// Decoding failures are logged and never surfaced to the caller.
pub fn extract_caller_id(credential_header: Option<&str>) -> Option<CallerId> {
  let credential = credential_header?;

  match decode_caller_id(credential) {
    Ok(caller_id) => Some(caller_id),
    Err(e) => {
      warn!(
        "admission control could not identify caller, treating request as anonymous: {}",
        e
      );

      None
    }
  }
}
