//! Mapping verified claim sets to local user records.

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::claims::TokenOrigin;
use crate::auth::error::AuthError;
use crate::auth::resolver::Authenticated;
use crate::auth::user_store::UserStore;
use crate::db::schema::UserRecord;

/// Resolves an authenticated claim set to a user record, creating one on
/// first use of a federated subject.
#[derive(Clone)]
pub struct IdentityReconciler {
    store: Arc<UserStore>,
}

impl IdentityReconciler {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, auth: &Authenticated) -> Result<UserRecord, AuthError> {
        let subject = auth.claims.subject.as_str();

        let user = match auth.origin {
            // A valid local signature over a nonexistent user does not
            // authenticate.
            TokenOrigin::Local => self
                .fetch(subject)
                .await?
                .ok_or(AuthError::Unauthenticated)?,

            TokenOrigin::Federated => match self.fetch(subject).await? {
                Some(user) => user,
                None => self.provision(subject, auth.claims.email.as_deref()).await?,
            },
        };

        if !user.is_active {
            return Err(AuthError::UserDeactivated);
        }

        Ok(user)
    }

    async fn fetch(&self, subject: &str) -> Result<Option<UserRecord>, AuthError> {
        self.store
            .get_user(subject)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))
    }

    /// First use of a federated subject: create the account. A concurrent
    /// request may win the insert; the key-uniqueness violation then means
    /// "record now exists", so re-fetch instead of failing.
    async fn provision(
        &self,
        subject: &str,
        email: Option<&str>,
    ) -> Result<UserRecord, AuthError> {
        let created = self
            .store
            .create_federated_user(subject, email)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        match created {
            Some(user) => {
                info!(subject = %subject, "provisioned account for federated identity");
                Ok(user)
            }
            None => {
                debug!(subject = %subject, "lost provisioning race, re-fetching");
                self.fetch(subject).await?.ok_or_else(|| {
                    AuthError::Database("record missing after insert conflict".to_string())
                })
            }
        }
    }
}
