// REST API endpoints for the authentication service

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::auth::{
    AuthError, AuthResolver, Authenticated, FederatedVerifier, IdentityReconciler, KeySetCache,
    LocalSignup, OAuthProfile, SessionIssuer, TokenClaims, TokenOrigin, TokenPair, TokenSigner,
    UserStore,
};
use crate::config::AuthSettings;
use crate::db::Db;
use crate::db::schema::PublicUser;
use crate::types::UserId;

/// Shared state for all handlers.
pub struct AppState {
    pub store: Arc<UserStore>,
    pub key_set: Arc<KeySetCache>,
    pub federated: FederatedVerifier,
    pub resolver: AuthResolver,
    pub reconciler: IdentityReconciler,
    pub sessions: SessionIssuer,
    pub allow_unverified_sync: bool,
}

impl AppState {
    /// Wire up the authentication components over an open connection.
    pub fn new(db: Db, settings: &AuthSettings) -> Self {
        let store = Arc::new(UserStore::new(db));
        let signer = Arc::new(TokenSigner::new(&settings.secret_key));
        let key_set = Arc::new(KeySetCache::new(settings.federated.jwks_url.clone()));
        let federated = FederatedVerifier::new(
            key_set.clone(),
            settings.federated.issuer.clone(),
            settings.federated.audience.clone(),
        );
        let resolver = AuthResolver::new(federated.clone(), signer.clone());
        let reconciler = IdentityReconciler::new(store.clone());
        let sessions = SessionIssuer::new(signer, settings);

        Self {
            store,
            key_set,
            federated,
            resolver,
            reconciler,
            sessions,
            allow_unverified_sync: settings.allow_unverified_sync,
        }
    }

    /// Complete an OAuth login with an already-verified provider profile.
    ///
    /// The authorization-code exchange itself happens upstream; this seam
    /// takes its result, finds or creates the account, and issues the
    /// session pair.
    pub async fn complete_oauth_login(
        &self,
        profile: OAuthProfile,
    ) -> Result<(PublicUser, TokenPair), AuthError> {
        let user = self
            .store
            .get_or_create_oauth_user(profile)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        if !user.is_active {
            return Err(AuthError::UserDeactivated);
        }

        let pair = self
            .sessions
            .issue(&UserId::new(user.user_id.clone()))
            .map_err(|e| AuthError::Database(e.to_string()))?;

        Ok((user.to_public(), pair))
    }
}

/// Caller-facing error for all handlers.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthenticated,
    Forbidden(String),
    Conflict(String),
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Unauthenticated => Self::Unauthenticated,
            AuthError::Conflict(msg) => Self::Conflict(msg),
            AuthError::UserDeactivated => Self::Forbidden("User account is deactivated".to_string()),
            AuthError::Database(msg) => Self::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail),
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Could not validate credentials".to_string(),
            ),
            Self::Forbidden(detail) => (StatusCode::FORBIDDEN, detail),
            Self::Conflict(detail) => (StatusCode::CONFLICT, detail),
            Self::Internal(detail) => {
                error!("internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

impl TokenResponse {
    fn new(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/auth/sync-federated-user", post(sync_federated_user))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.email.is_none() && req.username.is_none() {
        return Err(ApiError::BadRequest(
            "email or username is required".to_string(),
        ));
    }
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password must not be empty".to_string()));
    }

    if let Some(email) = &req.email
        && state
            .store
            .get_user_by_email(email)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .is_some()
    {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    if let Some(username) = &req.username
        && state
            .store
            .get_user_by_username(username)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .is_some()
    {
        return Err(ApiError::Conflict("Username already taken".to_string()));
    }

    let user = state
        .store
        .create_local_user(LocalSignup {
            email: req.email,
            username: req.username,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let pair = state
        .sessions
        .issue(&UserId::new(user.user_id))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(token_response(&state, pair))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .store
        .verify_credentials(&req.identifier, &req.password)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or(ApiError::Unauthenticated)?;

    if !user.is_active {
        return Err(AuthError::UserDeactivated.into());
    }

    if let Err(e) = state.store.update_last_login(&user.user_id).await {
        warn!("failed to update last_login: {}", e);
    }

    let pair = state
        .sessions
        .issue(&UserId::new(user.user_id))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(token_response(&state, pair))
}

async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PublicUser>, ApiError> {
    let token = bearer_token(&headers)?;
    let auth = state.resolver.authenticate(token).await?;
    let user = state.reconciler.resolve(&auth).await?;
    Ok(Json(user.to_public()))
}

async fn sync_federated_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let token = bearer_token(&headers)?;

    let claims = if state.allow_unverified_sync {
        warn!("accepting federated claims without signature verification");
        let raw = unverified_claims(token)?;
        if raw.sub.is_empty() || raw.email.is_none() {
            return Err(ApiError::BadRequest(
                "Invalid token payload: missing sub or email".to_string(),
            ));
        }
        TokenClaims {
            subject: raw.sub,
            email: raw.email,
            purpose: None,
            issuer: None,
            audience: None,
            expires_at: None,
            issued_at: None,
        }
    } else {
        state.federated.verify(token).await.map_err(|e| {
            debug!(error = %e, "sync token rejected");
            ApiError::Unauthenticated
        })?
    };

    let auth = Authenticated {
        claims,
        origin: TokenOrigin::Federated,
    };
    let user = state.reconciler.resolve(&auth).await?;

    Ok(Json(json!({ "success": true, "user_id": user.user_id })))
}

fn token_response(state: &AppState, pair: TokenPair) -> impl IntoResponse + use<> {
    let cookie = state.sessions.refresh_cookie(&pair.refresh_token);
    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(TokenResponse::new(pair)),
    )
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated)
}

/// Decode a token's claim payload without verifying its signature. Only
/// reachable when unverified sync is explicitly enabled.
fn unverified_claims(token: &str) -> Result<RawSyncClaims, ApiError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ApiError::BadRequest("invalid token format".to_string()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| ApiError::BadRequest("invalid token encoding".to_string()))?;

    serde_json::from_slice(&bytes)
        .map_err(|_| ApiError::BadRequest("invalid token payload".to_string()))
}

#[derive(Debug, Deserialize)]
struct RawSyncClaims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: Option<String>,
}
