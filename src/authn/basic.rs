use std::sync::Arc;

use async_trait::async_trait;
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use hyper::header::WWW_AUTHENTICATE;
use hyper::http::request::Parts;
use tracing::debug;

use super::{verify_secret, AuthnScheme, ChallengeOutcome, SchemeState};
use crate::authz::AuthzBackend;
use crate::hash::HashAlgorithm;
use crate::server::response::PendingResponse;

/// RFC 7617 Basic authentication: the credential payload is the base64 form
/// of `user:password`, matched against the backend's stored secret.
pub struct BasicScheme {
    realm: String,
    hash: Option<&'static HashAlgorithm>,
    backend: Arc<dyn AuthzBackend>,
}

impl BasicScheme {
    pub fn new(
        realm: &str,
        hash: Option<&'static HashAlgorithm>,
        backend: Arc<dyn AuthzBackend>,
    ) -> Self {
        Self {
            realm: realm.to_string(),
            hash,
            backend,
        }
    }
}

#[async_trait]
impl AuthnScheme for BasicScheme {
    fn scheme_name(&self) -> &'static str {
        "Basic"
    }

    async fn challenge(
        &self,
        _state: Option<&SchemeState>,
        _parts: &Parts,
        response: &mut PendingResponse,
    ) -> ChallengeOutcome {
        response.add_header(
            WWW_AUTHENTICATE,
            &format!(r#"Basic realm="{}", charset="UTF-8""#, self.realm),
        );
        ChallengeOutcome::Unhandled
    }

    async fn check(
        &self,
        _state: Option<&SchemeState>,
        _method: &str,
        _uri: &str,
        credential: &str,
    ) -> Option<String> {
        let decoded = match BASE64_STANDARD.decode(credential) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("basic credential is not valid base64: {e}");
                return None;
            }
        };
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;

        let Some(stored) = self.backend.user_secret(user).await else {
            debug!("unknown user");
            return None;
        };

        if verify_secret(&stored, password, self.hash) {
            Some(user.to_string())
        } else {
            debug!("password verification failed for '{user}'");
            None
        }
    }
}
