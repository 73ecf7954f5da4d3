//! Verified token claims shared by both verification paths.

use serde::{Deserialize, Serialize};

/// Purpose of a locally-issued session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Access,
    Refresh,
}

/// Which verification path accepted a token.
///
/// The origin decides how the subject is reconciled against the user store:
/// a local subject must already exist, a federated subject may be
/// auto-provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    Local,
    Federated,
}

/// Semantic claim set extracted from a verified token.
///
/// `subject` is non-empty for any claim set a verifier returns.
#[derive(Debug, Clone)]
pub struct TokenClaims {
    /// The authenticated principal.
    pub subject: String,
    /// Email asserted by the issuer, when present.
    pub email: Option<String>,
    /// Token purpose; only locally-issued tokens carry one.
    pub purpose: Option<TokenPurpose>,
    /// Issuer, when asserted.
    pub issuer: Option<String>,
    /// Audience, when asserted as a single string.
    pub audience: Option<String>,
    /// Expiry as a Unix timestamp.
    pub expires_at: Option<i64>,
    /// Issued-at as a Unix timestamp.
    pub issued_at: Option<i64>,
}
