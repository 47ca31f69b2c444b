use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AuthzBackend;
use crate::auth::session::AuthSession;
use crate::configuration::JwtBackendConfig;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    home: Option<String>,
}

/// Claims-based backend. Session tokens are HS256-signed JWTs carrying the
/// identity, so there is nothing to join: any server sharing the key can
/// rebuild the session from the token alone.
///
/// There is no password store behind this backend; it only makes sense with
/// token-carrying schemes (Bearer, OAuth2).
pub struct JwtBackend {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
}

impl JwtBackend {
    pub fn new(config: &JwtBackendConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims::<&str>(&[]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    fn decode_claims(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation()) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!("token rejected: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl AuthzBackend for JwtBackend {
    fn name(&self) -> &'static str {
        "jwt"
    }

    async fn user_secret(&self, _user: &str) -> Option<String> {
        None
    }

    async fn check_token(&self, token: &str) -> Option<String> {
        self.decode_claims(token).map(|claims| claims.sub)
    }

    async fn session_from_token(&self, token: &str) -> Option<AuthSession> {
        let claims = self.decode_claims(token)?;

        let mut session = AuthSession::new(&claims.sub, "Bearer");
        session.group = claims.group;
        session.home = claims.home;
        session.token = Some(token.to_string());
        Some(session)
    }

    fn issues_tokens(&self) -> bool {
        true
    }

    fn generate_token(&self, session: &AuthSession, expire_secs: u64) -> Option<String> {
        let exp = super::expires_at(expire_secs).map(|t| t.timestamp());
        let claims = Claims {
            sub: session.user.clone(),
            exp,
            iss: self.issuer.clone(),
            group: session.group.clone(),
            home: session.home.clone(),
        };

        match encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("cannot sign session token: {e}");
                None
            }
        }
    }
}
