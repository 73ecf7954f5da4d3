//! Session issuance: the access/refresh token pair.

use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::auth::claims::TokenPurpose;
use crate::auth::token::TokenSigner;
use crate::config::AuthSettings;
use crate::types::UserId;

/// Access and refresh token created together at login/signup time.
///
/// Both carry the same subject; neither is ever re-derived from the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues session token pairs for local accounts.
///
/// Used at signup, local login, and OAuth completion. Federated-token
/// holders never get a local session; they re-present their federation
/// token on each request.
#[derive(Clone)]
pub struct SessionIssuer {
    signer: Arc<TokenSigner>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionIssuer {
    pub fn new(signer: Arc<TokenSigner>, settings: &AuthSettings) -> Self {
        Self {
            signer,
            access_ttl: Duration::minutes(settings.access_token_ttl_minutes),
            refresh_ttl: Duration::days(settings.refresh_token_ttl_days),
        }
    }

    /// Issue a fresh token pair for a user.
    pub fn issue(&self, user_id: &UserId) -> Result<TokenPair> {
        let access_token = self
            .signer
            .sign(user_id.as_str(), TokenPurpose::Access, self.access_ttl)?;
        let refresh_token = self
            .signer
            .sign(user_id.as_str(), TokenPurpose::Refresh, self.refresh_ttl)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Render the refresh-token cookie delivered alongside the body.
    pub fn refresh_cookie(&self, refresh_token: &str) -> String {
        format!(
            "refresh_token={}; HttpOnly; Secure; SameSite=Lax; Max-Age={}; Path=/",
            refresh_token,
            self.refresh_ttl.num_seconds()
        )
    }
}
