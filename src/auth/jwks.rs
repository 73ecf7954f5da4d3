//! Signing key-set fetching and caching.
//!
//! The cache holds the federated issuer's published public keys, indexed by
//! key id. It starts empty, fetches lazily on the first lookup that needs
//! it, and replaces the whole set atomically on every successful refresh.
//! A failed refresh never evicts previously good keys.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::auth::error::KeySetError;
use crate::types::KeyId;

/// Timeout for a single key-set fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// A single key from the issuer's key-set document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC", "OKP").
    pub kty: String,
    /// Key ID, used to match the token header kid.
    pub kid: Option<String>,
    /// Algorithm (e.g., "ES256").
    pub alg: Option<String>,
    /// Key use ("sig" for signature).
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus (base64url encoded).
    pub n: Option<String>,
    /// RSA exponent (base64url encoded).
    pub e: Option<String>,
    /// EC curve or OKP subtype (e.g., "P-256", "Ed25519").
    pub crv: Option<String>,
    /// EC/OKP x coordinate (base64url encoded).
    pub x: Option<String>,
    /// EC y coordinate (base64url encoded).
    pub y: Option<String>,
    /// X.509 certificate chain.
    pub x5c: Option<Vec<String>>,
}

/// A key-set document containing multiple keys.
#[derive(Debug, Clone, Deserialize)]
pub struct KeySetDocument {
    pub keys: Vec<Jwk>,
}

/// A cached key ready for verification.
#[derive(Clone, Debug)]
pub struct KeyEntry {
    pub decoding_key: DecodingKey,
    pub algorithm: Algorithm,
}

/// Thread-safe cache of the federated issuer's signing keys.
///
/// Many concurrent readers, one occasional writer: the refresh-on-miss path
/// serializes through `fetch_lock` so simultaneous misses collapse into a
/// single network call, and waiters observe that call's result instead of
/// re-fetching.
pub struct KeySetCache {
    /// The key-set endpoint URL; `None` means unconfigured.
    jwks_url: Option<String>,
    /// Cached keys by kid, replaced wholesale on refresh.
    keys: RwLock<HashMap<KeyId, KeyEntry>>,
    /// Bumped after every successful refresh.
    generation: AtomicU64,
    /// Held for the duration of a fetch.
    fetch_lock: Mutex<()>,
    /// HTTP client for fetching the key set.
    client: reqwest::Client,
}

impl KeySetCache {
    /// Create a new cache. The cache stays empty until a lookup needs it.
    pub fn new(jwks_url: Option<String>) -> Self {
        Self {
            jwks_url,
            keys: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
            fetch_lock: Mutex::new(()),
            client: reqwest::Client::builder()
                .timeout(FETCH_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }

    /// Look up a verification key by key id, fetching the key set if the
    /// cache cannot satisfy the lookup.
    pub async fn get_key(&self, kid: &str) -> Result<KeyEntry, KeySetError> {
        let url = self.jwks_url.as_deref().ok_or(KeySetError::Unconfigured)?;

        if let Some(entry) = self.get_from_cache(kid).await {
            return Ok(entry);
        }

        // Miss: refresh, but let at most one fetch be in flight. Everyone
        // queued behind the lock observes the winner's generation bump and
        // skips its own fetch.
        let seen = self.generation.load(Ordering::Acquire);
        let _guard = self.fetch_lock.lock().await;

        if self.generation.load(Ordering::Acquire) == seen {
            self.fetch_keys(url).await?;
        }

        self.get_from_cache(kid)
            .await
            .ok_or_else(|| KeySetError::KeyNotFound(KeyId::new(kid)))
    }

    /// Fetch the key set eagerly, e.g. at process start to avoid paying the
    /// network round trip on the first federated request.
    pub async fn warm(&self) -> Result<(), KeySetError> {
        let url = self.jwks_url.as_deref().ok_or(KeySetError::Unconfigured)?;
        let _guard = self.fetch_lock.lock().await;
        self.fetch_keys(url).await
    }

    async fn get_from_cache(&self, kid: &str) -> Option<KeyEntry> {
        self.keys.read().await.get(kid).cloned()
    }

    /// Fetch and parse the key set, replacing the cache on success. On any
    /// failure the current cache state is left untouched.
    async fn fetch_keys(&self, url: &str) -> Result<(), KeySetError> {
        debug!("fetching signing key set from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KeySetError::FetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySetError::FetchFailed(format!(
                "HTTP {} from key-set endpoint",
                response.status()
            )));
        }

        let document: KeySetDocument = response
            .json()
            .await
            .map_err(|e| KeySetError::FetchFailed(format!("invalid key-set payload: {}", e)))?;

        let mut new_keys = HashMap::new();

        for jwk in document.keys {
            // Only signature keys are relevant here.
            if jwk.key_use.as_deref() == Some("enc") {
                debug!("skipping encryption key");
                continue;
            }

            match Self::entry_from_jwk(&jwk) {
                Ok(Some(entry)) => {
                    let kid = KeyId::new(jwk.kid.clone().unwrap_or_else(|| "default".to_string()));
                    debug!("cached signing key with kid: {}", kid);
                    new_keys.insert(kid, entry);
                }
                Ok(None) => {
                    debug!("skipping unsupported key type: {}", jwk.kty);
                }
                Err(e) => {
                    warn!("failed to parse key-set entry: {}", e);
                }
            }
        }

        if new_keys.is_empty() {
            return Err(KeySetError::FetchFailed(
                "no usable signing keys in key-set payload".to_string(),
            ));
        }

        {
            let mut keys = self.keys.write().await;
            *keys = new_keys;
        }
        self.generation.fetch_add(1, Ordering::Release);

        debug!("cached {} signing keys", self.keys.read().await.len());
        Ok(())
    }

    /// Convert a key-set entry to a verification key plus its algorithm.
    /// Returns `Ok(None)` for key types this service does not verify with.
    fn entry_from_jwk(jwk: &Jwk) -> Result<Option<KeyEntry>, KeySetError> {
        match jwk.kty.as_str() {
            "EC" => {
                let x = require_field(jwk, &jwk.x, "x")?;
                let y = require_field(jwk, &jwk.y, "y")?;
                let decoding_key = DecodingKey::from_ec_components(x, y)
                    .map_err(|e| parse_error(format!("invalid EC components: {}", e)))?;
                let algorithm = match jwk.alg.as_deref() {
                    Some(alg) => parse_algorithm(alg)?,
                    None if jwk.crv.as_deref() == Some("P-384") => Algorithm::ES384,
                    None => Algorithm::ES256,
                };
                Ok(Some(KeyEntry {
                    decoding_key,
                    algorithm,
                }))
            }
            "OKP" => {
                if jwk.crv.as_deref() != Some("Ed25519") {
                    return Ok(None);
                }
                let x = require_field(jwk, &jwk.x, "x")?;
                let decoding_key = DecodingKey::from_ed_components(x)
                    .map_err(|e| parse_error(format!("invalid Ed25519 component: {}", e)))?;
                Ok(Some(KeyEntry {
                    decoding_key,
                    algorithm: Algorithm::EdDSA,
                }))
            }
            "RSA" => {
                // Prefer an embedded certificate when present.
                if let Some(x5c) = &jwk.x5c
                    && let Some(cert) = x5c.first()
                {
                    let cert_der = base64::engine::general_purpose::STANDARD
                        .decode(cert)
                        .map_err(|e| parse_error(format!("invalid x5c: {}", e)))?;
                    return Ok(Some(KeyEntry {
                        decoding_key: DecodingKey::from_rsa_der(&cert_der),
                        algorithm: match jwk.alg.as_deref() {
                            Some(alg) => parse_algorithm(alg)?,
                            None => Algorithm::RS256,
                        },
                    }));
                }

                let n = require_field(jwk, &jwk.n, "n")?;
                let e = require_field(jwk, &jwk.e, "e")?;
                let decoding_key = DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| parse_error(format!("invalid RSA components: {}", e)))?;
                let algorithm = match jwk.alg.as_deref() {
                    Some(alg) => parse_algorithm(alg)?,
                    None => Algorithm::RS256,
                };
                Ok(Some(KeyEntry {
                    decoding_key,
                    algorithm,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Check if the cache has any keys.
    pub async fn has_keys(&self) -> bool {
        !self.keys.read().await.is_empty()
    }

    /// Get the number of cached keys.
    pub async fn key_count(&self) -> usize {
        self.keys.read().await.len()
    }
}

fn require_field<'a>(
    jwk: &Jwk,
    field: &'a Option<String>,
    name: &str,
) -> Result<&'a str, KeySetError> {
    field
        .as_deref()
        .ok_or_else(|| parse_error(format!("missing '{}' in {} key", name, jwk.kty)))
}

fn parse_algorithm(alg: &str) -> Result<Algorithm, KeySetError> {
    alg.parse()
        .map_err(|_| parse_error(format!("unsupported algorithm: {}", alg)))
}

fn parse_error(msg: String) -> KeySetError {
    KeySetError::FetchFailed(msg)
}
