use std::env;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn string_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset falls back to the default; a set-but-malformed value is an error
/// rather than a silent fallback.
fn minutes_or(key: &str, default: i64) -> anyhow::Result<i64> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .with_context(|| format!("{key} is not a valid number of minutes: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt: JwtConfig {
                secret: required("JWT_SECRET")?,
                issuer: string_or("JWT_ISSUER", "stridelog"),
                audience: string_or("JWT_AUDIENCE", "stridelog-users"),
                ttl_minutes: minutes_or("JWT_TTL_MINUTES", 60)?,
                refresh_ttl_minutes: minutes_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name; env is process-global and the
    // test runner is parallel.

    #[test]
    fn minutes_fall_back_when_unset() {
        assert_eq!(minutes_or("STRIDELOG_TEST_TTL_UNSET", 45).unwrap(), 45);
    }

    #[test]
    fn minutes_parse_when_set() {
        env::set_var("STRIDELOG_TEST_TTL_SET", " 90 ");
        assert_eq!(minutes_or("STRIDELOG_TEST_TTL_SET", 45).unwrap(), 90);
    }

    #[test]
    fn malformed_minutes_are_an_error_not_a_fallback() {
        env::set_var("STRIDELOG_TEST_TTL_BAD", "ninety");
        assert!(minutes_or("STRIDELOG_TEST_TTL_BAD", 45).is_err());
    }

    #[test]
    fn missing_required_variable_names_the_key() {
        let err = required("STRIDELOG_TEST_MISSING").unwrap_err();
        assert!(err.to_string().contains("STRIDELOG_TEST_MISSING"));
    }
}
