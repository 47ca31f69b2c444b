pub mod none;

#[cfg(feature = "authn-basic")]
pub mod basic;
#[cfg(feature = "authn-bearer")]
pub mod bearer;
#[cfg(feature = "authn-digest")]
pub mod digest;
#[cfg(feature = "authn-oauth2")]
pub mod oauth2;

use std::net::SocketAddr;
use std::sync::Arc;

use argon2::password_hash::PasswordHash;
use argon2::{Argon2, PasswordVerifier};
use async_trait::async_trait;
use hyper::http::request::Parts;
use tracing::debug;

use crate::authz::AuthzBackend;
use crate::configuration::{AuthConfig, AuthnType};
use crate::hash::HashAlgorithm;
use crate::server::error::Error;
use crate::server::response::PendingResponse;

/// What the driver did with a failed request.
#[derive(Debug, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// The driver added its challenge header; the connector decides the
    /// status (401, or the login redirect policy).
    Unhandled,
    /// The driver wrote the whole response itself.
    Responded,
}

/// Per-client driver state, created when a client attaches. Only Digest uses
/// it today (the connection's nonce), but the slot belongs to the trait so
/// drivers with per-client state need no side tables.
pub struct SchemeState {
    pub nonce: String,
}

/// Authentication scheme driver: the wire-level protocol by which credentials
/// are conveyed and verified. One instance per server, shared by all clients.
#[async_trait]
pub trait AuthnScheme: Send + Sync {
    /// Wire name matched against the first token of the `Authorization` value.
    fn scheme_name(&self) -> &'static str;

    /// Whether the scheme needs a credential before `check` is worth calling.
    fn requires_credentials(&self) -> bool {
        true
    }

    /// Per-client setup, run once when a client attaches.
    fn setup(&self, _remote: SocketAddr) -> Option<SchemeState> {
        None
    }

    /// Emit a challenge for a denied request.
    async fn challenge(
        &self,
        state: Option<&SchemeState>,
        parts: &Parts,
        response: &mut PendingResponse,
    ) -> ChallengeOutcome;

    /// Verify a credential payload; returns the authenticated user name.
    async fn check(
        &self,
        state: Option<&SchemeState>,
        method: &str,
        uri: &str,
        credential: &str,
    ) -> Option<String>;
}

/// Bind the configured scheme driver, rejecting selections that were not
/// compiled in.
pub fn from_config(
    config: &AuthConfig,
    hash: Option<&'static HashAlgorithm>,
    backend: Arc<dyn AuthzBackend>,
) -> Result<Arc<dyn AuthnScheme>, Error> {
    match config.scheme {
        AuthnType::None => Ok(Arc::new(none::NoneScheme::new(config.user.as_deref()))),
        #[cfg(feature = "authn-basic")]
        AuthnType::Basic => Ok(Arc::new(basic::BasicScheme::new(
            &config.realm,
            hash,
            backend,
        ))),
        #[cfg(not(feature = "authn-basic"))]
        AuthnType::Basic => Err(unavailable("basic")),
        #[cfg(feature = "authn-digest")]
        AuthnType::Digest => {
            let hash = hash.ok_or_else(|| {
                Error::Initialization("digest authentication requires a hash algorithm".to_string())
            })?;
            Ok(Arc::new(digest::DigestScheme::new(
                &config.realm,
                hash,
                backend,
            )))
        }
        #[cfg(not(feature = "authn-digest"))]
        AuthnType::Digest => Err(unavailable("digest")),
        #[cfg(feature = "authn-bearer")]
        AuthnType::Bearer => Ok(Arc::new(bearer::BearerScheme::new(&config.realm, backend))),
        #[cfg(not(feature = "authn-bearer"))]
        AuthnType::Bearer => Err(unavailable("bearer")),
        #[cfg(feature = "authn-oauth2")]
        AuthnType::OAuth2 => {
            let oauth2 = config.oauth2.as_ref().ok_or_else(|| {
                Error::Initialization("oauth2 authentication is not configured".to_string())
            })?;
            Ok(Arc::new(oauth2::OAuth2Scheme::new(
                &config.realm,
                oauth2,
                backend,
            )))
        }
        #[cfg(not(feature = "authn-oauth2"))]
        AuthnType::OAuth2 => Err(unavailable("oauth2")),
    }
}

#[allow(dead_code)]
fn unavailable(name: &str) -> Error {
    Error::Initialization(format!(
        "authentication type '{name}' is not compiled in, change configuration"
    ))
}

/// Match a presented password against a stored secret.
///
/// Stored secrets come in three forms: an argon2 PHC string, a hex digest in
/// the configured algorithm, or the bare password.
pub(crate) fn verify_secret(
    stored: &str,
    presented: &str,
    hash: Option<&'static HashAlgorithm>,
) -> bool {
    if stored.starts_with("$argon2") {
        return match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(presented.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                debug!("invalid stored password hash: {e}");
                false
            }
        };
    }

    if let Some(hash) = hash {
        if stored.len() == hash.digest_size * 2
            && stored.eq_ignore_ascii_case(&hash.hex_digest(&[presented.as_bytes()]))
        {
            return true;
        }
    }

    stored == presented
}
