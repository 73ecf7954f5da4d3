// Core modules
mod config;
mod types;

pub mod api;
pub mod auth;
pub mod db;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{
    AuthError, AuthResolver, Authenticated, FederatedVerifier, IdentityReconciler, KeySetCache,
    KeySetError, LocalSignup, OAuthProfile, SessionIssuer, TokenClaims, TokenOrigin, TokenPair,
    TokenPurpose, TokenSigner, UserStore, VerifyError,
};
pub use config::{AuthSettings, FederatedConfig};
pub use db::schema::{AuthProvider, PublicUser, UserRecord};
pub use db::{DatabaseConfig, Db, create_connection, ensure_schema};
pub use types::{KeyId, UserId};

use std::sync::Arc;

use anyhow::Result;

/// Convenience function to create fully wired application state.
///
/// Opens the database connection, applies the schema, and builds the
/// authentication components. Pair with [`create_router`] to serve it.
pub async fn create_state(
    db_config: DatabaseConfig,
    settings: AuthSettings,
) -> Result<Arc<AppState>> {
    let db = create_connection(db_config).await?;
    ensure_schema(&db).await?;
    Ok(Arc::new(AppState::new(db, &settings)))
}
