//! Service configuration.
//!
//! Everything is overridable through environment variables so the binary can
//! run unconfigured in local development. The federated-issuer settings are
//! optional on purpose: a deployment without a federated identity provider
//! still serves local signup/login, and the missing key-set URL only
//! surfaces as an error when a federated verification is actually attempted.

use serde::{Deserialize, Serialize};
use std::env;

/// Default access-token lifetime in minutes.
pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 30;

/// Default refresh-token lifetime in days.
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

/// Settings for the federated token-verification path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FederatedConfig {
    /// Key-set endpoint of the external issuer (e.g. a JWKS URL).
    #[serde(default)]
    pub jwks_url: Option<String>,
    /// Expected `iss` claim of federated tokens.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Expected `aud` claim of federated tokens.
    #[serde(default)]
    pub audience: Option<String>,
}

impl FederatedConfig {
    pub fn from_env() -> Self {
        Self {
            jwks_url: env::var("AUTH_FEDERATED_JWKS_URL").ok(),
            issuer: env::var("AUTH_FEDERATED_ISSUER").ok(),
            audience: env::var("AUTH_FEDERATED_AUDIENCE").ok(),
        }
    }
}

/// Top-level authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Symmetric secret for locally-issued session tokens.
    pub secret_key: String,
    /// Access-token lifetime in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_minutes: i64,
    /// Refresh-token lifetime in days.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_days: i64,
    /// Federated-issuer settings.
    #[serde(default)]
    pub federated: FederatedConfig,
    /// Accept federated claims without signature verification on the sync
    /// endpoint. Off by default; every use is logged as a warning.
    #[serde(default)]
    pub allow_unverified_sync: bool,
}

fn default_access_ttl() -> i64 {
    DEFAULT_ACCESS_TTL_MINUTES
}

fn default_refresh_ttl() -> i64 {
    DEFAULT_REFRESH_TTL_DAYS
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            secret_key: env::var("AUTH_SECRET_KEY")
                .unwrap_or_else(|_| "dev-secret-change-me".to_string()),
            access_token_ttl_minutes: env::var("AUTH_ACCESS_TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_ACCESS_TTL_MINUTES),
            refresh_token_ttl_days: env::var("AUTH_REFRESH_TOKEN_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REFRESH_TTL_DAYS),
            federated: FederatedConfig::from_env(),
            allow_unverified_sync: env::var("AUTH_ALLOW_UNVERIFIED_SYNC")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

impl AuthSettings {
    /// Create settings for local-only operation with an explicit secret.
    pub fn local(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            access_token_ttl_minutes: DEFAULT_ACCESS_TTL_MINUTES,
            refresh_token_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            federated: FederatedConfig::default(),
            allow_unverified_sync: false,
        }
    }

    /// Create settings with a federated issuer configured.
    pub fn with_federated(
        secret_key: impl Into<String>,
        jwks_url: String,
        issuer: Option<String>,
        audience: Option<String>,
    ) -> Self {
        Self {
            federated: FederatedConfig {
                jwks_url: Some(jwks_url),
                issuer,
                audience,
            },
            ..Self::local(secret_key)
        }
    }
}
