use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::header::WWW_AUTHENTICATE;
use hyper::http::request::Parts;
use tracing::{debug, warn};

use super::{AuthnScheme, ChallengeOutcome, SchemeState};
use crate::auth::token;
use crate::authz::AuthzBackend;
use crate::hash::HashAlgorithm;
use crate::server::response::PendingResponse;

/// RFC 2617 Digest authentication with `qop="auth"`.
///
/// Each connection gets a fresh nonce when the client attaches; the credential
/// must quote that nonce back, which ties a captured digest to one connection.
/// The stored secret has to be recoverable plaintext (or a pre-agreed string):
/// one-way password hashes cannot feed the A1 computation.
pub struct DigestScheme {
    realm: String,
    hash: &'static HashAlgorithm,
    backend: Arc<dyn AuthzBackend>,
}

impl DigestScheme {
    pub fn new(realm: &str, hash: &'static HashAlgorithm, backend: Arc<dyn AuthzBackend>) -> Self {
        Self {
            realm: realm.to_string(),
            hash,
            backend,
        }
    }

    fn hex(&self, parts: &[&str]) -> String {
        let joined = parts.join(":");
        self.hash.hex_digest(&[joined.as_bytes()])
    }
}

/// Split a `key="value", key=value, ...` parameter list, honoring quotes.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim_matches(|c: char| c == ',' || c.is_whitespace());
        let after = after.trim_start();

        let (value, remainder) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (&after[..end], &after[end..]),
                None => (after, ""),
            }
        };

        params.insert(key.to_ascii_lowercase(), value.trim().to_string());
        rest = remainder.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
    }

    params
}

#[async_trait]
impl AuthnScheme for DigestScheme {
    fn scheme_name(&self) -> &'static str {
        "Digest"
    }

    fn setup(&self, _remote: SocketAddr) -> Option<SchemeState> {
        Some(SchemeState {
            nonce: token::generate(),
        })
    }

    async fn challenge(
        &self,
        state: Option<&SchemeState>,
        _parts: &Parts,
        response: &mut PendingResponse,
    ) -> ChallengeOutcome {
        let nonce = match state {
            Some(state) => state.nonce.clone(),
            None => token::generate(),
        };

        response.add_header(
            WWW_AUTHENTICATE,
            &format!(
                r#"Digest realm="{}", qop="auth", nonce="{nonce}""#,
                self.realm
            ),
        );
        ChallengeOutcome::Unhandled
    }

    async fn check(
        &self,
        state: Option<&SchemeState>,
        method: &str,
        uri: &str,
        credential: &str,
    ) -> Option<String> {
        let params = parse_params(credential);

        let username = params.get("username")?;
        let client_response = params.get("response")?;
        let client_uri = params.get("uri")?;
        let nonce = params.get("nonce")?;

        let Some(state) = state else {
            warn!("digest check without a client nonce");
            return None;
        };
        if *nonce != state.nonce {
            debug!("stale or foreign nonce");
            return None;
        }

        if let Some(realm) = params.get("realm") {
            if *realm != self.realm {
                debug!("digest realm mismatch");
                return None;
            }
        }

        // The digest covers the URI the client quoted; it must name the
        // requested resource.
        if client_uri != uri {
            debug!("digest uri mismatch: {client_uri} != {uri}");
            return None;
        }

        let stored = self.backend.user_secret(username).await?;
        if stored.starts_with("$argon2") {
            warn!("digest authentication cannot verify one-way password hashes");
            return None;
        }

        let ha1 = self.hex(&[username, &self.realm, &stored]);
        let ha2 = self.hex(&[method, client_uri]);

        let expected = match (params.get("qop"), params.get("nc"), params.get("cnonce")) {
            (Some(qop), Some(nc), Some(cnonce)) if qop == "auth" => {
                self.hex(&[&ha1, nonce, nc, cnonce, qop, &ha2])
            }
            (None, _, _) => self.hex(&[&ha1, nonce, &ha2]),
            (Some(qop), _, _) => {
                debug!("unsupported qop '{qop}'");
                return None;
            }
        };

        if expected.eq_ignore_ascii_case(client_response) {
            Some(username.clone())
        } else {
            debug!("digest verification failed for '{username}'");
            None
        }
    }
}
