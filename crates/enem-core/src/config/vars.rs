//! Environment variable interpolation for config files.
//!
//! Supports the following syntax:
//! - `$VAR` or `${VAR}` - substitute with env var value, error if missing
//! - `${VAR:-default}` - use default if VAR is unset OR empty
//! - `${VAR-default}` - use default only if VAR is unset (empty is OK)
//! - `$$` - escape sequence for literal `$`

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

use crate::error::ConfigError;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # Escape sequence $$
        |
        \$\{                           # Opening ${
            ([A-Za-z_][A-Za-z0-9_]*)   # Variable name (capture group 1)
            (?:
                (:?-)                  # :- or just - (capture group 2)
                ([^}]*)                # Default value (capture group 3)
            )?
        \}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)     # Unbraced $VAR (capture group 4)
        ",
    )
    .expect("Invalid regex pattern")
});

/// Interpolate environment variables in the given text.
///
/// Every problem is collected before failing, so a config with three
/// missing variables reports all three at once.
pub fn interpolate(input: &str) -> Result<String, ConfigError> {
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN.replace_all(input, |caps: &Captures| {
        let full_match = &caps[0];
        if full_match == "$$" {
            return "$".to_string();
        }

        match resolve(caps) {
            Ok(value) => value,
            Err(message) => {
                errors.push(message);
                full_match.to_string()
            }
        }
    });

    if errors.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(ConfigError::EnvInterpolation {
            message: errors.join("\n"),
        })
    }
}

fn resolve(caps: &Captures) -> Result<String, String> {
    let name = caps
        .get(1)
        .or_else(|| caps.get(4))
        .map(|m| m.as_str())
        .unwrap_or_default();
    let empty_means_unset = caps.get(2).is_some_and(|m| m.as_str() == ":-");
    let default = caps.get(3).map(|m| m.as_str());

    match env::var(name) {
        Ok(value) if value.contains('\n') || value.contains('\r') => Err(format!(
            "environment variable '{name}' contains newlines, which is not allowed"
        )),
        Ok(value) if value.is_empty() && empty_means_unset => {
            Ok(default.unwrap_or_default().to_string())
        }
        Ok(value) => Ok(value),
        Err(_) => default
            .map(str::to_string)
            .ok_or_else(|| format!("environment variable '{name}' is not set")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_env_vars<F, R>(vars: &[(&str, Option<&str>)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let originals: Vec<_> = vars.iter().map(|(k, _)| (*k, env::var(k).ok())).collect();

        // SAFETY: each test uses its own variable names and restores them afterwards
        for (key, value) in vars {
            match value {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        let result = f();

        // SAFETY: restoring original environment state
        for (key, original) in originals {
            match original {
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        result
    }

    #[test]
    fn test_plain_and_braced_substitution() {
        with_env_vars(&[("ENEM_TEST_BUCKET", Some("enem-bucket"))], || {
            let text = interpolate("a: $ENEM_TEST_BUCKET\nb: ${ENEM_TEST_BUCKET}/silver").unwrap();
            assert_eq!(text, "a: enem-bucket\nb: enem-bucket/silver");
        });
    }

    #[test]
    fn test_all_missing_variables_reported() {
        with_env_vars(
            &[("ENEM_TEST_MISSING_A", None), ("ENEM_TEST_MISSING_B", None)],
            || {
                let err = interpolate("a: $ENEM_TEST_MISSING_A\nb: ${ENEM_TEST_MISSING_B}")
                    .unwrap_err()
                    .to_string();
                assert!(err.contains("ENEM_TEST_MISSING_A"));
                assert!(err.contains("ENEM_TEST_MISSING_B"));
                assert!(err.contains("not set"));
            },
        );
    }

    #[test]
    fn test_colon_default_applies_to_empty() {
        with_env_vars(&[("ENEM_TEST_EMPTY", Some(""))], || {
            assert_eq!(
                interpolate("v: ${ENEM_TEST_EMPTY:-fallback}").unwrap(),
                "v: fallback"
            );
            assert_eq!(interpolate("v: ${ENEM_TEST_EMPTY-fallback}").unwrap(), "v: ");
        });
    }

    #[test]
    fn test_default_value_unset() {
        with_env_vars(&[("ENEM_TEST_UNSET", None)], || {
            assert_eq!(
                interpolate("v: ${ENEM_TEST_UNSET-silver/parquet}").unwrap(),
                "v: silver/parquet"
            );
        });
    }

    #[test]
    fn test_newlines_rejected() {
        with_env_vars(&[("ENEM_TEST_NEWLINE", Some("a\nb: c"))], || {
            let err = interpolate("v: $ENEM_TEST_NEWLINE").unwrap_err();
            assert!(err.to_string().contains("newlines"));
        });
    }

    #[test]
    fn test_escape_sequence() {
        assert_eq!(interpolate("price: $$100").unwrap(), "price: $100");
    }
}
