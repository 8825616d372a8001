use lazy_static::lazy_static;
use regex::{Captures, Regex};

// Interpolation rules follow the POSIX shell parameter expansion:
// https://pubs.opengroup.org/onlinepubs/000095399/basedefs/xbd_chap08.html

lazy_static! {
  static ref ENVIRONMENT_VARIABLE_INTERPOLATION_REGEX: Regex = Regex::new(
    r"(?x)
    \$\$|
    \$([[:word:].]+)|
    \$\{([[:word:].]+)(?:(:?-|:?\?)([^}]*))?\}",
  )
  // @expected: 👇
  .unwrap();
}

pub type Warnings = Vec<String>;
pub type Errors = Vec<String>;

pub trait EnvVars {
  fn get_var(&self, key: &str) -> Option<String>;
}

impl<F> EnvVars for F
where
  F: Fn(&str) -> Option<String>,
{
  fn get_var(&self, key: &str) -> Option<String> {
    self(key)
  }
}

/// Replaces `$VAR`, `${VAR}`, `${VAR:-default}`, `${VAR-default}`, `${VAR:?error}` and `${VAR?error}`
/// with values from the environment. `$$` is a literal `$`.
pub fn interpolate(input: &str, env_vars: impl EnvVars) -> Result<(String, Warnings), Errors> {
  let mut errors = Vec::new();
  let mut warnings = Vec::new();

  let interpolated = ENVIRONMENT_VARIABLE_INTERPOLATION_REGEX
    .replace_all(input, |caps: &Captures| {
      let flags = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
      let default_or_error = caps
        .get(4)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .to_string();

      let name = match caps.get(1).or_else(|| caps.get(2)) {
        Some(name) => name.as_str(),
        None => return "$".to_string(),
      };
      let value = env_vars.get_var(name);

      match flags {
        ":-" => match value {
          Some(v) if !v.is_empty() => v,
          _ => default_or_error,
        },
        "-" => value.unwrap_or(default_or_error),
        ":?" => match value {
          Some(v) if !v.is_empty() => v,
          _ => {
            errors.push(format!(
              "non-empty environment variable {:?} is required: {}",
              name, default_or_error
            ));
            String::new()
          }
        },
        "?" => value.unwrap_or_else(|| {
          errors.push(format!(
            "environment variable {:?} is required: {}",
            name, default_or_error
          ));
          String::new()
        }),
        _ => value.unwrap_or_else(|| {
          warnings.push(format!("unknown environment variable {:?}", name));
          String::new()
        }),
      }
    })
    .into_owned();

  if errors.is_empty() {
    Ok((interpolated, warnings))
  } else {
    Err(errors)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn env(key: &str) -> Option<String> {
    match key {
      "MAX_QUERY_DEPTH" => Some("7".to_string()),
      "EMPTY" => Some("".to_string()),
      _ => None,
    }
  }

  #[test]
  fn replaces_known_variables() {
    let (result, warnings) = interpolate("max_depth: ${MAX_QUERY_DEPTH}", env).unwrap();

    assert_eq!(result, "max_depth: 7");
    assert!(warnings.is_empty());

    let (result, _) = interpolate("max_depth: $MAX_QUERY_DEPTH", env).unwrap();
    assert_eq!(result, "max_depth: 7");
  }

  #[test]
  fn applies_defaults() {
    let (result, _) = interpolate("${MISSING:-5} ${EMPTY:-3} ${EMPTY-3}", env).unwrap();

    assert_eq!(result, "5 3 ");
  }

  #[test]
  fn escapes_dollar_sign() {
    let (result, _) = interpolate("price: $$10", env).unwrap();

    assert_eq!(result, "price: $10");
  }

  #[test]
  fn warns_on_unknown_variables() {
    let (result, warnings) = interpolate("value: ${MISSING}", env).unwrap();

    assert_eq!(result, "value: ");
    assert_eq!(warnings.len(), 1);
  }

  #[test]
  fn fails_on_required_variables() {
    let errors = interpolate("${MISSING?set it} ${EMPTY:?set it too}", env).unwrap_err();

    assert_eq!(errors.len(), 2);
  }
}
