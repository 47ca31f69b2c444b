use std::net::SocketAddr;
use std::sync::Arc;

use hyper::header::{HeaderName, CACHE_CONTROL, LOCATION, WWW_AUTHENTICATE};
use hyper::http::request::Parts;
use hyper::StatusCode;
use tracing::{debug, info, instrument, warn};

use super::session::AuthSession;
use super::{token, AuthModule};
use crate::authn::{AuthnScheme, ChallengeOutcome, SchemeState};
use crate::authz::AuthzBackend;
use crate::metrics_provider::METRICS_PROVIDER;
use crate::server::request_ext::HeaderExt;
use crate::server::response::PendingResponse;

const USER_FIELD: &str = "X-Remote-User";
const GROUP_FIELD: &str = "X-Remote-Group";
const HOME_FIELD: &str = "X-Remote-Home";

/// What a connector did with the request.
#[derive(Debug, PartialEq, Eq)]
pub enum ConnectorResult {
    /// Not this connector's to finish; the pipeline proceeds.
    Forward,
    /// The accumulated response is final.
    Complete,
}

/// Credential found on the request, in extraction order: a scheme-prefixed
/// `Authorization` value (header or cookie), or a bare token from the
/// `X-Auth-Token` channel.
enum Credential {
    Authorization {
        raw: Option<String>,
        payload: String,
    },
    Token(String),
}

impl Credential {
    fn raw_authorization(&self) -> Option<&str> {
        match self {
            Credential::Authorization { raw, .. } => raw.as_deref(),
            Credential::Token(_) => None,
        }
    }
}

/// Per-connection connector state.
///
/// One `ClientCtx` exists per client connection and is driven sequentially by
/// the connection task: first the home connector (when enabled), then the
/// authentication connector. A verified identity is cached here, so later
/// requests on the connection are admitted without touching the drivers
/// again; disconnecting drops the context and the session with it.
pub struct ClientCtx {
    module: Arc<AuthModule>,
    remote: SocketAddr,
    scheme_state: Option<SchemeState>,
    session: Option<Arc<AuthSession>>,
}

impl ClientCtx {
    pub(crate) fn new(module: Arc<AuthModule>, remote: SocketAddr) -> Self {
        let scheme_state = module.scheme.setup(remote);
        Self {
            module,
            remote,
            scheme_state,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Arc<AuthSession>> {
        self.session.as_ref()
    }

    #[instrument(skip_all, fields(remote = %self.remote))]
    pub async fn handle(
        &mut self,
        parts: &mut Parts,
        response: &mut PendingResponse,
    ) -> ConnectorResult {
        if self.module.options.home_redirect {
            if let ConnectorResult::Complete = self.home_connector(parts, response) {
                return ConnectorResult::Complete;
            }
        }

        self.authn_connector(parts, response).await
    }

    /// Send authenticated clients into their home directory.
    fn home_connector(&self, parts: &Parts, response: &mut PendingResponse) -> ConnectorResult {
        let Some(session) = &self.session else {
            return ConnectorResult::Forward;
        };
        let Some(home) = session.home.as_deref().filter(|home| !home.is_empty()) else {
            return ConnectorResult::Forward;
        };

        // WebSocket endpoints live outside the home tree.
        if parts.is_websocket_upgrade() {
            return ConnectorResult::Forward;
        }

        let path = parts.decoded_path();
        if path
            .trim_start_matches('/')
            .starts_with(home.trim_start_matches('/'))
        {
            return ConnectorResult::Forward;
        }

        debug!("redirecting to home {home}");
        response.add_header(LOCATION, &format!("{home}/"));
        response.set_status(StatusCode::MOVED_PERMANENTLY);
        ConnectorResult::Complete
    }

    async fn authn_connector(
        &mut self,
        parts: &mut Parts,
        response: &mut PendingResponse,
    ) -> ConnectorResult {
        // This connection already authenticated; re-attach the identity and
        // let the pipeline proceed without reverifying anything.
        if let Some(session) = self.session.clone() {
            self.attach_identity(None, &session, response);
            parts.extensions.insert(session);
            return ConnectorResult::Forward;
        }

        // A WWW-Authenticate header on a request is the logout convention:
        // ignore any credentials and challenge, so the client drops its
        // cached authorization.
        if self.module.header_logout
            && parts
                .get_header(WWW_AUTHENTICATE)
                .is_some_and(|value| !value.is_empty())
        {
            debug!("client requested logout");
            return self.challenge(parts, response).await;
        }

        if let Some(credential) = self.extract_credential(parts) {
            if let Some(session) = self.verify(parts, &credential).await {
                let session = Arc::new(session);
                METRICS_PROVIDER
                    .auth_attempts
                    .with_label_values(&[self.module.scheme.scheme_name(), "success"])
                    .inc();
                info!("user \"{}\" accepted from {}", session.user, self.remote);

                #[cfg(all(feature = "impersonation", unix))]
                if self.module.options.impersonate {
                    super::impersonate::switch_user(&session.user);
                }

                self.attach_identity(credential.raw_authorization(), &session, response);
                parts.extensions.insert(Arc::clone(&session));
                self.session = Some(session);
                return ConnectorResult::Forward;
            }

            METRICS_PROVIDER
                .auth_attempts
                .with_label_values(&[self.module.scheme.scheme_name(), "failed"])
                .inc();
        }

        // Anonymous admission for paths outside the protection patterns;
        // unprotect wins over protect.
        let path = parts.decoded_path();
        if !self.module.protect.matches(&path) || self.module.unprotect.matches(&path) {
            return ConnectorResult::Forward;
        }

        self.challenge(parts, response).await
    }

    /// Extraction order: `Authorization` header, `Authorization` cookie,
    /// then the token channel. A credential whose scheme prefix does not
    /// match the configured scheme is discarded.
    fn extract_credential(&self, parts: &Parts) -> Option<Credential> {
        let module = &self.module;

        let authorization = parts
            .authorization()
            .or_else(|| parts.cookie("Authorization").filter(|v| !v.is_empty()));

        if let Some(raw) = authorization {
            let scheme_label = module.scheme.scheme_name();
            match raw.split_once(' ') {
                Some((prefix, payload)) if prefix == scheme_label => {
                    return Some(Credential::Authorization {
                        payload: payload.to_string(),
                        raw: Some(raw),
                    });
                }
                Some((prefix, _)) => {
                    warn!("authorization type mismatch: got '{prefix}', expected '{scheme_label}'");
                }
                None => {
                    warn!("malformed authorization value");
                }
            }
        }

        if module.options.issue_tokens {
            // Tokens are attached on one channel but accepted from either;
            // the header wins when both are present.
            let token = parts
                .get_header(token::TOKEN_HEADER)
                .filter(|token| !token.is_empty())
                .or_else(|| parts.cookie(token::TOKEN_HEADER));
            if let Some(token) = token.filter(|token| !token.is_empty()) {
                return Some(Credential::Token(token));
            }
        }

        if !module.scheme.requires_credentials() {
            return Some(Credential::Authorization {
                raw: None,
                payload: String::new(),
            });
        }

        None
    }

    async fn verify(&self, parts: &Parts, credential: &Credential) -> Option<AuthSession> {
        let module = &self.module;

        match credential {
            Credential::Authorization { payload, .. } => {
                // With a centralized login page the client cannot recompute
                // per-resource credentials, so verification may be pinned to
                // HEAD. Opt-in: one authorization then opens every resource.
                let method = if module.redirect.is_some() && module.redirect_head_check {
                    "HEAD"
                } else {
                    parts.method.as_str()
                };
                let uri = parts
                    .uri
                    .path_and_query()
                    .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());

                let user = module
                    .scheme
                    .check(self.scheme_state.as_ref(), method, &uri, payload)
                    .await?;

                // A self-describing credential already carries the whole
                // identity; anything else is assembled from backend lookups.
                let mut session = match module.backend.session_from_token(payload).await {
                    Some(mut session) => {
                        session.scheme = module.scheme.scheme_name().to_string();
                        session
                    }
                    None => self.lookup_identity(&user).await,
                };
                if session.token.is_none() {
                    self.mint_token(&mut session).await;
                }
                Some(session)
            }
            Credential::Token(token) => {
                if let Some(mut session) = module.backend.session_from_token(token).await {
                    session.scheme = module.scheme.scheme_name().to_string();
                    return Some(session);
                }

                let user = module.backend.check_token(token).await?;
                let mut session = self.lookup_identity(&user).await;
                session.token = Some(token.clone());
                Some(session)
            }
        }
    }

    async fn lookup_identity(&self, user: &str) -> AuthSession {
        let module = &self.module;
        let mut session = AuthSession::new(user, module.scheme.scheme_name());
        session.group = module.backend.group(&session.user).await;
        session.home = module.backend.home(&session.user).await;
        session
    }

    async fn mint_token(&self, session: &mut AuthSession) {
        let module = &self.module;
        if !module.options.issue_tokens {
            return;
        }

        if module.backend.issues_tokens() {
            session.token = module.backend.generate_token(session, module.expire);
            return;
        }

        let token = token::generate();
        match module.backend.join(&session.user, &token, module.expire).await {
            Ok(()) => session.token = Some(token),
            Err(e) => warn!("cannot bind session token: {e}"),
        }
    }

    /// Propagate identity on the response: token (or the original
    /// authorization), user, group and home marker. The header channel wins
    /// when both channels are enabled.
    fn attach_identity(
        &self,
        raw_authorization: Option<&str>,
        session: &AuthSession,
        response: &mut PendingResponse,
    ) {
        let options = &self.module.options;
        if !options.identity_headers && !options.identity_cookies {
            return;
        }
        let use_headers = options.identity_headers;

        let mut set = |name: &str, value: &str| {
            if use_headers {
                match HeaderName::from_bytes(name.as_bytes()) {
                    Ok(header) => response.add_header(header, value),
                    Err(e) => warn!("invalid identity header name '{name}': {e}"),
                }
            } else {
                response.add_cookie(name, value);
            }
        };

        if let Some(token) = &session.token {
            set(token::TOKEN_HEADER, token);
        } else if let Some(raw) = raw_authorization {
            set("Authorization", raw);
        }

        set(USER_FIELD, &session.user);
        if let Some(group) = &session.group {
            set(GROUP_FIELD, group);
        }
        if session.home.is_some() {
            set(HOME_FIELD, "~/");
        }
    }

    /// Denied request: let the driver challenge, then apply the XHR and
    /// login-redirect policies.
    async fn challenge(&self, parts: &Parts, response: &mut PendingResponse) -> ConnectorResult {
        let module = &self.module;

        let outcome = module
            .scheme
            .challenge(self.scheme_state.as_ref(), parts, response)
            .await;
        if outcome == ChallengeOutcome::Responded {
            return ConnectorResult::Complete;
        }

        // Script callers cannot follow an interactive login; deny outright
        // instead of redirecting.
        if parts.is_xhr() {
            response.set_status(StatusCode::FORBIDDEN);
            return ConnectorResult::Complete;
        }

        if let Some(redirect) = &module.redirect {
            let path = parts.decoded_path();
            if redirect.pattern.matches(&path) {
                // The login page itself: admit it so another handler can
                // serve the form.
                response.set_status(StatusCode::OK);
                return ConnectorResult::Forward;
            }

            response.add_header(LOCATION, &redirect.url);
            response.add_header(CACHE_CONTROL, "no-cache");
            response.set_status(StatusCode::FOUND);
            return ConnectorResult::Complete;
        }

        response.set_status(StatusCode::UNAUTHORIZED);
        ConnectorResult::Complete
    }
}
