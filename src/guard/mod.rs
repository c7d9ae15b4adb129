//! Bearer token guard for protected routes.
//!
//! Tokens are verified offline against the user pool JWKS. The keyset is
//! cached in memory with a TTL; a stale cache, an unknown `kid` or a health
//! check may trigger a refresh, but at most one fetch starts per cooldown
//! window. If a refresh fails the last known keyset stays in use, and an
//! empty keyset fails closed.

pub mod error;
pub mod jwks;
pub mod jwt;

pub use self::error::Error;
pub use self::jwks::{Jwk, Jwks};
pub use self::jwt::{AuthenticatedUser, VerificationOptions, verify_rs256};

use crate::api::ApiError;
use anyhow::{Context, Result, anyhow};
use axum::{
    extract::{Extension, Request},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use reqwest::Client;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant, SystemTime},
};
use tokio::sync::RwLock;
use tracing::{Instrument, debug, info, info_span, warn};

// User pools rotate signing keys rarely; an hour keeps verification offline
// for nearly every request.
const KEYSET_CACHE_TTL_SECONDS: u64 = 3600;
const KEYSET_REFRESH_COOLDOWN_SECONDS: u64 = 30;

#[derive(Debug)]
enum KeysetSource {
    /// Keyset supplied up front and never refreshed.
    Static,
    /// Keyset fetched from the user pool `jwks.json` and refreshed as needed.
    Remote { url: String, client: Client },
}

#[derive(Debug, Clone)]
struct KeysetCache {
    keyset: Jwks,
    fetched_at: Instant,
}

impl KeysetCache {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < Duration::from_secs(KEYSET_CACHE_TTL_SECONDS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStatus {
    /// JWKS endpoint reachable and the keyset parsed.
    Ok,
    /// JWKS endpoint unreachable or returned garbage.
    Error,
    /// Static keyset, nothing to reach.
    Static,
}

impl DependencyStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Static => "static",
        }
    }

    #[must_use]
    pub const fn is_healthy(self) -> bool {
        !matches!(self, Self::Error)
    }
}

/// Verifies user pool tokens using a cached JWKS.
#[derive(Debug)]
pub struct TokenVerifier {
    keyset_source: KeysetSource,
    keyset_cache: RwLock<KeysetCache>,
    /// Expected `iss` (`https://cognito-idp.<region>.amazonaws.com/<pool>`).
    issuer: String,
    /// App client id the token must be bound to.
    client_id: String,
    /// Unix time of the last request-driven fetch attempt.
    last_refresh_unix: AtomicU64,
    /// Outcome of the last fetch attempt.
    reachable: AtomicBool,
}

impl TokenVerifier {
    /// Build from a fixed keyset, no remote refresh.
    #[must_use]
    pub fn new(keyset: Jwks, issuer: String, client_id: String) -> Self {
        Self {
            keyset_source: KeysetSource::Static,
            keyset_cache: RwLock::new(KeysetCache {
                keyset,
                fetched_at: Instant::now(),
            }),
            issuer,
            client_id,
            last_refresh_unix: AtomicU64::new(0),
            reachable: AtomicBool::new(true),
        }
    }

    /// Build a verifier that fetches the JWKS from `url`.
    ///
    /// The startup fetch is best-effort: when it fails the verifier starts
    /// with an empty, stale keyset and rejects every token until a refresh
    /// succeeds. The startup fetch does not open a cooldown window, so the
    /// first unknown `kid` after boot can refresh right away.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub async fn new_remote(
        url: String,
        issuer: String,
        client_id: String,
        timeout: Duration,
    ) -> Result<Self> {
        url::Url::parse(&url).with_context(|| format!("Invalid JWKS URL: {url}"))?;

        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build JWKS HTTP client")?;

        let (keyset, fetched_at, reachable) = match fetch_keyset(&client, &url).await {
            Ok(keyset) => (keyset, Instant::now(), true),
            Err(err) => {
                warn!(
                    url = %url,
                    error = %err,
                    "JWKS fetch failed during startup; continuing with empty keyset"
                );
                (Jwks::default(), stale_instant(), false)
            }
        };

        Ok(Self {
            keyset_source: KeysetSource::Remote { url, client },
            keyset_cache: RwLock::new(KeysetCache { keyset, fetched_at }),
            issuer,
            client_id,
            last_refresh_unix: AtomicU64::new(0),
            reachable: AtomicBool::new(reachable),
        })
    }

    /// Remote JWKS URL when configured, otherwise `None`.
    #[must_use]
    pub fn keyset_url(&self) -> Option<&str> {
        match &self.keyset_source {
            KeysetSource::Static => None,
            KeysetSource::Remote { url, .. } => Some(url.as_str()),
        }
    }

    /// Verify a bearer token and return its claims.
    ///
    /// On unknown `kid` the keyset is refreshed once (subject to cooldown)
    /// and verification is retried once.
    ///
    /// # Errors
    /// Returns the verification failure; no provider round trip is made.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedUser, Error> {
        let keyset = self.keyset_snapshot().await;

        match self.verify_with(token, &keyset) {
            Err(Error::UnknownKid(kid)) => {
                if !self.refresh_throttled().await {
                    debug!(kid = %kid, "token kid not found and refresh suppressed");
                    return Err(Error::UnknownKid(kid));
                }
                let keyset = self.keyset_snapshot().await;
                self.verify_with(token, &keyset)
            }
            result => result,
        }
    }

    fn verify_with(&self, token: &str, keyset: &Jwks) -> Result<AuthenticatedUser, Error> {
        if keyset.is_empty() {
            return Err(Error::KeysUnavailable);
        }
        let options = VerificationOptions {
            expected_issuer: &self.issuer,
            expected_client_id: &self.client_id,
            now_unix_seconds: now_unix_seconds(),
        };
        verify_rs256(token, keyset, &options)
    }

    /// Return a keyset snapshot. A stale cache is refreshed when the
    /// cooldown allows it; otherwise, or if the refresh fails, the cached
    /// keyset is returned.
    async fn keyset_snapshot(&self) -> Jwks {
        let (cached, fresh) = {
            let cache = self.keyset_cache.read().await;
            (cache.keyset.clone(), cache.is_fresh())
        };

        if fresh || !self.refresh_throttled().await {
            return cached;
        }

        self.keyset_cache.read().await.keyset.clone()
    }

    async fn refresh_keyset(&self) -> Result<()> {
        let (url, client) = match &self.keyset_source {
            KeysetSource::Static => return Ok(()),
            KeysetSource::Remote { url, client } => (url, client),
        };

        let keyset = fetch_keyset(client, url).await?;
        let mut cache = self.keyset_cache.write().await;
        cache.keyset = keyset;
        cache.fetched_at = Instant::now();
        info!(keyset_keys = cache.keyset.keys.len(), "JWKS cache refreshed");
        Ok(())
    }

    /// Report JWKS reachability for `/health`.
    ///
    /// Probes the endpoint when the cooldown allows a fetch; within the
    /// window the outcome of the last attempt is reported.
    pub async fn dependency_status(&self) -> DependencyStatus {
        match &self.keyset_source {
            KeysetSource::Static => DependencyStatus::Static,
            KeysetSource::Remote { .. } => {
                self.refresh_throttled().await;
                if self.reachable.load(Ordering::Relaxed) {
                    DependencyStatus::Ok
                } else {
                    DependencyStatus::Error
                }
            }
        }
    }

    /// Claim the refresh slot if the cooldown window has passed.
    fn claim_refresh(&self) -> bool {
        let now = now_unix_seconds_u64();
        let last = self.last_refresh_unix.load(Ordering::Relaxed);
        if now.saturating_sub(last) < KEYSET_REFRESH_COOLDOWN_SECONDS {
            return false;
        }
        // Concurrent callers race for the slot; only one fetches.
        self.last_refresh_unix
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    /// Fetch the keyset at most once per cooldown window.
    ///
    /// Returns `true` only when this call fetched a new keyset.
    async fn refresh_throttled(&self) -> bool {
        let KeysetSource::Remote { url, .. } = &self.keyset_source else {
            return false;
        };
        if !self.claim_refresh() {
            return false;
        }
        match self.refresh_keyset().await {
            Ok(()) => {
                self.reachable.store(true, Ordering::Relaxed);
                true
            }
            Err(err) => {
                self.reachable.store(false, Ordering::Relaxed);
                warn!(error = %err, url = %url, "JWKS refresh failed");
                false
            }
        }
    }
}

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// # Errors
/// `MissingToken` without the header, `InvalidHeader` for any other scheme
/// or an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, Error> {
    let value = headers.get(AUTHORIZATION).ok_or(Error::MissingToken)?;
    let value = value.to_str().map_err(|_| Error::InvalidHeader)?;
    let (scheme, token) = value.split_once(' ').ok_or(Error::InvalidHeader)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(Error::InvalidHeader);
    }
    Ok(token)
}

/// Middleware for protected routes: verify the bearer token and attach the
/// [`AuthenticatedUser`] to the request, or reject with `401`.
pub async fn require_bearer(
    Extension(verifier): Extension<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let verified = match bearer_token(request.headers()) {
        Ok(token) => verifier.verify(token).await,
        Err(err) => Err(err),
    };

    match verified {
        Ok(user) => {
            debug!(sub = %user.sub, token_use = %user.token_use, "bearer token verified");
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(err) => {
            debug!(error = %err, "bearer token rejected");
            ApiError::unauthorized(err.to_string()).into_response()
        }
    }
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

fn now_unix_seconds_u64() -> u64 {
    u64::try_from(now_unix_seconds()).unwrap_or(0)
}

/// An Instant that is already stale so the first verification refreshes.
fn stale_instant() -> Instant {
    Instant::now()
        .checked_sub(Duration::from_secs(KEYSET_CACHE_TTL_SECONDS + 1))
        .unwrap_or_else(Instant::now)
}

async fn fetch_keyset(client: &Client, url: &str) -> Result<Jwks> {
    let span = info_span!("jwks.fetch", http.method = "GET", url = %url);
    async {
        let response = client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(anyhow!("JWKS fetch failed: {status}"));
        }

        Jwks::from_json(&body).context("Invalid JWKS JSON")
    }
    .instrument(span)
    .await
}
