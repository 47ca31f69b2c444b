use async_trait::async_trait;
use hyper::http::request::Parts;

use super::{AuthnScheme, ChallengeOutcome, SchemeState};
use crate::server::response::PendingResponse;

const DEFAULT_USER: &str = "anonymous";

/// Pass-through scheme: every request is verified as a configured identity,
/// without any credential on the wire. Useful to give downstream handlers a
/// uniform identity record on servers that do not authenticate.
pub struct NoneScheme {
    user: String,
}

impl NoneScheme {
    pub fn new(user: Option<&str>) -> Self {
        Self {
            user: user.unwrap_or(DEFAULT_USER).to_string(),
        }
    }
}

#[async_trait]
impl AuthnScheme for NoneScheme {
    fn scheme_name(&self) -> &'static str {
        "None"
    }

    fn requires_credentials(&self) -> bool {
        false
    }

    async fn challenge(
        &self,
        _state: Option<&SchemeState>,
        _parts: &Parts,
        _response: &mut PendingResponse,
    ) -> ChallengeOutcome {
        ChallengeOutcome::Unhandled
    }

    async fn check(
        &self,
        _state: Option<&SchemeState>,
        _method: &str,
        _uri: &str,
        _credential: &str,
    ) -> Option<String> {
        Some(self.user.clone())
    }
}
