use std::sync::Arc;

use async_trait::async_trait;
use hyper::header::WWW_AUTHENTICATE;
use hyper::http::request::Parts;
use tracing::debug;

use super::{AuthnScheme, ChallengeOutcome, SchemeState};
use crate::authz::AuthzBackend;
use crate::server::response::PendingResponse;

/// RFC 6750 Bearer authentication: the credential payload is a session token
/// the backend can resolve, either a self-describing signed token or an
/// opaque token previously issued and joined to a user.
pub struct BearerScheme {
    realm: String,
    backend: Arc<dyn AuthzBackend>,
}

impl BearerScheme {
    pub fn new(realm: &str, backend: Arc<dyn AuthzBackend>) -> Self {
        Self {
            realm: realm.to_string(),
            backend,
        }
    }
}

#[async_trait]
impl AuthnScheme for BearerScheme {
    fn scheme_name(&self) -> &'static str {
        "Bearer"
    }

    async fn challenge(
        &self,
        _state: Option<&SchemeState>,
        _parts: &Parts,
        response: &mut PendingResponse,
    ) -> ChallengeOutcome {
        response.add_header(
            WWW_AUTHENTICATE,
            &format!(r#"Bearer realm="{}""#, self.realm),
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
        if credential.is_empty() {
            return None;
        }

        if let Some(session) = self.backend.session_from_token(credential).await {
            return Some(session.user);
        }

        match self.backend.check_token(credential).await {
            Some(user) => Some(user),
            None => {
                debug!("bearer token rejected");
                None
            }
        }
    }
}
