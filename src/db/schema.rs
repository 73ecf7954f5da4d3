//! Record types persisted in SurrealDB.

use serde::{Deserialize, Serialize};
use surrealdb::{RecordId, sql::Datetime};

/// Which authentication path created (and owns) an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    /// Password-based signup against this service.
    Local,
    /// Google OAuth.
    Google,
    /// GitHub OAuth.
    Github,
    /// External federated issuer, verified through its published key set.
    Federated,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Google => "google",
            Self::Github => "github",
            Self::Federated => "federated",
        }
    }
}

/// Persisted user account.
///
/// The record key equals `user_id`; the duplicated string field exists so
/// the identifier round-trips through the API without SurrealQL key
/// escaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Database identifier (table: `user`, key: the account identifier).
    pub id: RecordId,
    /// The account identifier as a plain string.
    pub user_id: String,
    /// Email address, unique when present.
    pub email: Option<String>,
    /// Username, unique when present.
    pub username: Option<String>,
    /// Optional given name.
    pub first_name: Option<String>,
    /// Optional family name.
    pub last_name: Option<String>,
    /// Authentication path that owns this account.
    pub provider: AuthProvider,
    /// Provider-assigned id for OAuth accounts.
    pub provider_id: Option<String>,
    /// bcrypt digest; present only for local accounts.
    pub password_hash: Option<String>,
    /// Whether the account may authenticate.
    pub is_active: bool,
    /// Whether the identity was verified (by us or by the provider).
    pub is_verified: bool,
    /// When the account was created.
    pub created_at: Option<Datetime>,
    /// Last write to this record.
    pub updated_at: Option<Datetime>,
    /// Last successful password login.
    pub last_login: Option<Datetime>,
}

impl UserRecord {
    /// Public projection returned by the API; never exposes the password
    /// digest.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            provider: self.provider,
            is_verified: self.is_verified,
        }
    }
}

/// Payload for inserting a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub provider: AuthProvider,
    pub provider_id: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
}

/// API-facing view of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub provider: AuthProvider,
    pub is_verified: bool,
}
