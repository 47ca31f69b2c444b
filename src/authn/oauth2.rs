use std::sync::Arc;

use async_trait::async_trait;
use hyper::header::{CACHE_CONTROL, LOCATION};
use hyper::http::request::Parts;
use hyper::StatusCode;

use super::bearer::BearerScheme;
use super::{AuthnScheme, ChallengeOutcome, SchemeState};
use crate::authz::AuthzBackend;
use crate::configuration::OAuth2Config;
use crate::server::response::PendingResponse;

/// OAuth2 resource-server side: unauthenticated requests are sent to the
/// configured authorization endpoint, and access tokens come back with the
/// `oAuth2` authorization prefix. The code-for-token exchange happens at the
/// login service; this driver only validates the resulting token through the
/// backend, the same way Bearer does.
pub struct OAuth2Scheme {
    authorize_endpoint: String,
    client_id: Option<String>,
    bearer: BearerScheme,
}

impl OAuth2Scheme {
    pub fn new(realm: &str, config: &OAuth2Config, backend: Arc<dyn AuthzBackend>) -> Self {
        Self {
            authorize_endpoint: config.authorize_endpoint.clone(),
            client_id: config.client_id.clone(),
            bearer: BearerScheme::new(realm, backend),
        }
    }

    fn authorize_location(&self) -> String {
        match &self.client_id {
            Some(client_id) => {
                let separator = if self.authorize_endpoint.contains('?') {
                    '&'
                } else {
                    '?'
                };
                format!(
                    "{}{separator}response_type=code&client_id={client_id}",
                    self.authorize_endpoint
                )
            }
            None => self.authorize_endpoint.clone(),
        }
    }
}

#[async_trait]
impl AuthnScheme for OAuth2Scheme {
    fn scheme_name(&self) -> &'static str {
        "oAuth2"
    }

    async fn challenge(
        &self,
        _state: Option<&SchemeState>,
        _parts: &Parts,
        response: &mut PendingResponse,
    ) -> ChallengeOutcome {
        response.add_header(LOCATION, &self.authorize_location());
        response.add_header(CACHE_CONTROL, "no-cache");
        response.set_status(StatusCode::FOUND);
        ChallengeOutcome::Responded
    }

    async fn check(
        &self,
        state: Option<&SchemeState>,
        method: &str,
        uri: &str,
        credential: &str,
    ) -> Option<String> {
        self.bearer.check(state, method, uri, credential).await
    }
}
