//! Ordered-fallback resolution between the two token families.
//!
//! The same bearer slot accepts locally-issued HS256 sessions and
//! federated tokens, with no client-supplied hint of which one is
//! presented. Policy: try the federated path first; on any failure, try
//! the local signer on the same raw token; if both fail, reject uniformly.
//! Which path failed (and why) is logged at debug level only, so callers
//! cannot probe key-set state or credential family through error detail.

use std::sync::Arc;

use tracing::debug;

use crate::auth::claims::{TokenClaims, TokenOrigin};
use crate::auth::error::AuthError;
use crate::auth::federated::FederatedVerifier;
use crate::auth::token::TokenSigner;

/// A token accepted by one of the verification paths.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub claims: TokenClaims,
    pub origin: TokenOrigin,
}

/// Decides which verification path accepts an inbound token.
#[derive(Clone)]
pub struct AuthResolver {
    federated: FederatedVerifier,
    local: Arc<TokenSigner>,
}

impl AuthResolver {
    pub fn new(federated: FederatedVerifier, local: Arc<TokenSigner>) -> Self {
        Self { federated, local }
    }

    /// Authenticate a raw bearer token.
    ///
    /// Every request pays at least one verification attempt; a cache-cold
    /// federated token additionally pays the key-set fetch. Deployments
    /// that care about tail latency warm the key-set cache at startup.
    pub async fn authenticate(&self, token: &str) -> Result<Authenticated, AuthError> {
        match self.federated.verify(token).await {
            Ok(claims) => {
                return Ok(Authenticated {
                    claims,
                    origin: TokenOrigin::Federated,
                });
            }
            Err(err) => {
                debug!(error = %err, "federated verification failed, trying local path");
            }
        }

        match self.local.verify(token) {
            Ok(claims) => Ok(Authenticated {
                claims,
                origin: TokenOrigin::Local,
            }),
            Err(err) => {
                debug!(error = %err, "local verification failed");
                Err(AuthError::Unauthenticated)
            }
        }
    }
}
