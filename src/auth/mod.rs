//! Multi-provider authentication core.
//!
//! Two independent trust roots are accepted on the same bearer slot:
//!
//! - **Local**: HS256 session tokens signed with the process-wide secret,
//!   issued by this service at signup/login/OAuth completion.
//! - **Federated**: tokens from an external issuer, verified against its
//!   published key set fetched on demand and cached for the process
//!   lifetime.
//!
//! ## Control flow
//!
//! Inbound token → [`AuthResolver`] picks the verification path (federated
//! first, local fallback) → [`IdentityReconciler`] maps the verified claims
//! to a `user` row, auto-provisioning on first use of a federated subject.
//! At signup/login, [`SessionIssuer`] mints the access/refresh pair
//! independently of verification.
//!
//! ## Security model
//!
//! - Verification failures collapse to a uniform rejection at the resolver
//!   boundary; callers cannot learn which credential family or key state
//!   they are missing.
//! - The key-set cache is never poisoned by a failed refresh and is only
//!   replaced wholesale by a successful one.
//! - Account provisioning races are settled by the store's key-uniqueness
//!   constraint, not by check-then-insert.

mod claims;
mod error;
mod federated;
pub mod jwks;
mod reconciler;
mod resolver;
mod session;
mod token;
mod user_store;

pub use claims::{TokenClaims, TokenOrigin, TokenPurpose};
pub use error::{AuthError, KeySetError, VerifyError};
pub use federated::FederatedVerifier;
pub use jwks::KeySetCache;
pub use reconciler::IdentityReconciler;
pub use resolver::{AuthResolver, Authenticated};
pub use session::{SessionIssuer, TokenPair};
pub use token::TokenSigner;
pub use user_store::{LocalSignup, OAuthProfile, UserStore};
