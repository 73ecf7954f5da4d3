//! User storage and credential checks.

use anyhow::Result;
use tracing::debug;
use uuid::Uuid;

use crate::db::Db;
use crate::db::schema::{AuthProvider, UserCreate, UserRecord};

/// bcrypt digest verified when the identifier is unknown, so a login
/// attempt against a missing account costs the same as one against a
/// real account.
const DUMMY_BCRYPT_HASH: &str = "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

/// Signup payload for a password-based account.
#[derive(Debug, Clone)]
pub struct LocalSignup {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Profile returned by an OAuth provider after code exchange.
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub provider: AuthProvider,
    pub provider_id: String,
}

/// User store for database operations.
///
/// The only component allowed to create or mutate user rows from claim
/// data. It never deletes.
pub struct UserStore {
    db: Db,
}

impl UserStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Get a user by account identifier.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let user_id = user_id.to_string();

        let mut res = self
            .db
            .query("SELECT * FROM user WHERE user_id = $user_id LIMIT 1")
            .bind(("user_id", user_id))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Get a user by email.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = email.to_string();

        let mut res = self
            .db
            .query("SELECT * FROM user WHERE email = $email LIMIT 1")
            .bind(("email", email))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Get a user by username.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let username = username.to_string();

        let mut res = self
            .db
            .query("SELECT * FROM user WHERE username = $username LIMIT 1")
            .bind(("username", username))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Get a user by email or username, email tried first.
    pub async fn get_user_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>> {
        if let Some(user) = self.get_user_by_email(identifier).await? {
            return Ok(Some(user));
        }
        self.get_user_by_username(identifier).await
    }

    /// Create a password-based account with a generated identifier.
    pub async fn create_local_user(&self, signup: LocalSignup) -> Result<UserRecord> {
        let password_hash = bcrypt::hash(&signup.password, bcrypt::DEFAULT_COST)?;

        let create = UserCreate {
            user_id: Uuid::new_v4().to_string(),
            email: signup.email,
            username: signup.username,
            first_name: signup.first_name,
            last_name: signup.last_name,
            provider: AuthProvider::Local,
            provider_id: None,
            password_hash: Some(password_hash),
            is_active: true,
            is_verified: false,
        };

        self.try_insert(create)
            .await?
            .ok_or_else(|| anyhow::anyhow!("generated user id collided"))
    }

    /// Create an account for a federated subject seen for the first time.
    ///
    /// Returns `Ok(None)` when another request created the record first;
    /// the caller re-fetches in that case.
    pub async fn create_federated_user(
        &self,
        subject: &str,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>> {
        let username = match email {
            Some(e) => e.split('@').next().map(|s| s.to_string()),
            None => Some(format!(
                "user_{}",
                subject.chars().take(8).collect::<String>()
            )),
        };

        let create = UserCreate {
            user_id: subject.to_string(),
            email: email.map(|s| s.to_string()),
            username,
            first_name: None,
            last_name: None,
            provider: AuthProvider::Federated,
            provider_id: None,
            password_hash: None,
            is_active: true,
            is_verified: true,
        };

        self.try_insert(create).await
    }

    /// Find an OAuth account by email or create a provider-verified one.
    pub async fn get_or_create_oauth_user(&self, profile: OAuthProfile) -> Result<UserRecord> {
        if let Some(user) = self.get_user_by_email(&profile.email).await? {
            return Ok(user);
        }

        let create = UserCreate {
            user_id: Uuid::new_v4().to_string(),
            email: Some(profile.email.clone()),
            username: None,
            first_name: profile.first_name,
            last_name: profile.last_name,
            provider: profile.provider,
            provider_id: Some(profile.provider_id),
            password_hash: None,
            is_active: true,
            is_verified: true,
        };

        match self.try_insert(create).await? {
            Some(user) => Ok(user),
            // Lost a signup race on the same email; take the winner.
            None => self
                .get_user_by_email(&profile.email)
                .await?
                .ok_or_else(|| anyhow::anyhow!("oauth account vanished after insert conflict")),
        }
    }

    /// Check password credentials for an identifier.
    ///
    /// Returns `Ok(None)` for an unknown identifier, a wrong password, or
    /// an account without a password digest (federation-only account).
    pub async fn verify_credentials(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Option<UserRecord>> {
        let Some(user) = self.get_user_by_identifier(identifier).await? else {
            // Equalize timing with the found-account path.
            let _ = bcrypt::verify(password, DUMMY_BCRYPT_HASH);
            return Ok(None);
        };

        let Some(hash) = user.password_hash.as_deref() else {
            debug!("login attempt against account without password digest");
            let _ = bcrypt::verify(password, DUMMY_BCRYPT_HASH);
            return Ok(None);
        };

        if bcrypt::verify(password, hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    /// Record a successful password login.
    pub async fn update_last_login(&self, user_id: &str) -> Result<()> {
        let user_id = user_id.to_string();

        self.db
            .query("UPDATE user SET last_login = time::now() WHERE user_id = $user_id")
            .bind(("user_id", user_id))
            .await?;

        Ok(())
    }

    /// Deactivate a user account.
    pub async fn deactivate_user(&self, user_id: &str) -> Result<()> {
        let user_id = user_id.to_string();

        self.db
            .query("UPDATE user SET is_active = false WHERE user_id = $user_id")
            .bind(("user_id", user_id))
            .await?;

        Ok(())
    }

    /// Reactivate a user account.
    pub async fn reactivate_user(&self, user_id: &str) -> Result<()> {
        let user_id = user_id.to_string();

        self.db
            .query("UPDATE user SET is_active = true WHERE user_id = $user_id")
            .bind(("user_id", user_id))
            .await?;

        Ok(())
    }

    /// Insert a user keyed by its identifier. `Ok(None)` means the key is
    /// already taken — the record-key uniqueness constraint is the arbiter
    /// for concurrent first-use creation.
    async fn try_insert(&self, create: UserCreate) -> Result<Option<UserRecord>> {
        let key = create.user_id.clone();

        let created: Result<Option<UserRecord>, surrealdb::Error> =
            self.db.create(("user", key)).content(create).await;

        match created {
            Ok(user) => Ok(user),
            Err(e) => {
                let exists = matches!(
                    &e,
                    surrealdb::Error::Db(surrealdb::error::Db::RecordExists { .. })
                ) || e.to_string().contains("already exists");

                if exists { Ok(None) } else { Err(e.into()) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};

    async fn setup_test_db() -> Db {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            ..Default::default()
        };
        let db = create_connection(config).await.unwrap();
        ensure_schema(&db).await.unwrap();
        db
    }

    fn signup(email: &str, password: &str) -> LocalSignup {
        LocalSignup {
            email: Some(email.to_string()),
            username: None,
            password: password.to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    async fn test_create_local_user_hashes_password() {
        let store = UserStore::new(setup_test_db().await);

        let user = store
            .create_local_user(signup("a@x.com", "hunter2"))
            .await
            .unwrap();

        assert_eq!(user.email.as_deref(), Some("a@x.com"));
        assert_eq!(user.provider, AuthProvider::Local);
        assert!(user.is_active);
        assert!(!user.is_verified);
        let hash = user.password_hash.as_deref().unwrap();
        assert_ne!(hash, "hunter2");
        assert!(bcrypt::verify("hunter2", hash).unwrap());
    }

    #[tokio::test]
    async fn test_verify_credentials() {
        let store = UserStore::new(setup_test_db().await);
        store
            .create_local_user(signup("a@x.com", "hunter2"))
            .await
            .unwrap();

        let ok = store.verify_credentials("a@x.com", "hunter2").await.unwrap();
        assert!(ok.is_some());

        let wrong = store.verify_credentials("a@x.com", "wrong").await.unwrap();
        assert!(wrong.is_none());

        let unknown = store
            .verify_credentials("nobody@x.com", "hunter2")
            .await
            .unwrap();
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn test_credentials_by_username() {
        let store = UserStore::new(setup_test_db().await);
        store
            .create_local_user(LocalSignup {
                email: None,
                username: Some("alice".to_string()),
                password: "pw".to_string(),
                first_name: None,
                last_name: None,
            })
            .await
            .unwrap();

        assert!(store.verify_credentials("alice", "pw").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_federation_only_account_has_no_credentials() {
        let store = UserStore::new(setup_test_db().await);
        store
            .create_federated_user("ext-sub-1", Some("fed@x.com"))
            .await
            .unwrap()
            .unwrap();

        let res = store.verify_credentials("fed@x.com", "anything").await.unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn test_federated_create_derives_username() {
        let store = UserStore::new(setup_test_db().await);

        let with_email = store
            .create_federated_user("sub-1", Some("carol@x.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_email.username.as_deref(), Some("carol"));
        assert_eq!(with_email.provider, AuthProvider::Federated);
        assert!(with_email.password_hash.is_none());

        let without_email = store
            .create_federated_user("subject-without-mail", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(without_email.username.as_deref(), Some("user_subject-"));
    }

    #[tokio::test]
    async fn test_duplicate_federated_create_reports_conflict() {
        let store = UserStore::new(setup_test_db().await);

        let first = store
            .create_federated_user("sub-1", Some("a@x.com"))
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .create_federated_user("sub-1", Some("a@x.com"))
            .await
            .unwrap();
        assert!(second.is_none());

        let fetched = store.get_user("sub-1").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "sub-1");
    }

    #[tokio::test]
    async fn test_oauth_get_or_create_is_idempotent_by_email() {
        let store = UserStore::new(setup_test_db().await);

        let profile = OAuthProfile {
            email: "dev@x.com".to_string(),
            first_name: Some("Dev".to_string()),
            last_name: None,
            provider: AuthProvider::Github,
            provider_id: "gh-42".to_string(),
        };

        let first = store.get_or_create_oauth_user(profile.clone()).await.unwrap();
        assert_eq!(first.provider, AuthProvider::Github);
        assert!(first.is_verified);

        let second = store.get_or_create_oauth_user(profile).await.unwrap();
        assert_eq!(first.user_id, second.user_id);
    }

    #[tokio::test]
    async fn test_last_login_and_deactivation() {
        let store = UserStore::new(setup_test_db().await);
        let user = store
            .create_local_user(signup("a@x.com", "pw"))
            .await
            .unwrap();
        assert!(user.last_login.is_none());

        store.update_last_login(&user.user_id).await.unwrap();
        let updated = store.get_user(&user.user_id).await.unwrap().unwrap();
        assert!(updated.last_login.is_some());

        store.deactivate_user(&user.user_id).await.unwrap();
        assert!(!store.get_user(&user.user_id).await.unwrap().unwrap().is_active);

        store.reactivate_user(&user.user_id).await.unwrap();
        assert!(store.get_user(&user.user_id).await.unwrap().unwrap().is_active);
    }
}
