pub mod connector;
pub mod pattern;
pub mod session;
pub mod token;

#[cfg(all(feature = "impersonation", unix))]
pub mod impersonate;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::authn::AuthnScheme;
use crate::authz::AuthzBackend;
use crate::configuration::Configuration;
use crate::server::error::Error;
use crate::{authn, authz, hash};
use connector::ClientCtx;
use pattern::UrlPattern;
use session::MODULE_NAME;

/// Identity propagation and enforcement switches, resolved from the
/// configuration at module creation.
pub(crate) struct IdentityOptions {
    pub issue_tokens: bool,
    pub identity_headers: bool,
    pub identity_cookies: bool,
    pub home_redirect: bool,
    #[cfg(all(feature = "impersonation", unix))]
    pub impersonate: bool,
}

/// Login-page redirect target: the URL sent in `Location`, and the pattern
/// that recognizes the login page itself so it is always admitted.
pub(crate) struct RedirectTarget {
    pub url: String,
    pub pattern: UrlPattern,
}

impl RedirectTarget {
    fn new(url: &str) -> Self {
        let tail = match url.find("://") {
            Some(scheme_end) => {
                let after_host = &url[scheme_end + 3..];
                match after_host.find('/') {
                    Some(slash) => &after_host[slash..],
                    None => "",
                }
            }
            None => url,
        };

        Self {
            url: url.to_string(),
            pattern: UrlPattern::compile(tail),
        }
    }
}

/// Per-server authentication module: the configured scheme and backend pair,
/// the resolved policy switches, and the URL protection patterns. Created
/// once, shared by every client connection.
pub struct AuthModule {
    pub(crate) scheme: Arc<dyn AuthnScheme>,
    pub(crate) backend: Arc<dyn AuthzBackend>,
    pub(crate) options: IdentityOptions,
    pub(crate) protect: UrlPattern,
    pub(crate) unprotect: UrlPattern,
    pub(crate) redirect: Option<RedirectTarget>,
    pub(crate) expire: u64,
    pub(crate) header_logout: bool,
    pub(crate) redirect_head_check: bool,
}

impl AuthModule {
    pub fn new(config: &Configuration) -> Result<Arc<Self>, Error> {
        let auth = &config.auth;

        let backend_config = auth.backend.as_ref().ok_or_else(|| {
            Error::Initialization(
                "authentication storage not set, change configuration".to_string(),
            )
        })?;
        let backend = authz::from_config(backend_config)?;

        let mut issue_tokens = auth.issue_tokens;
        if issue_tokens && !backend.supports_join() && !backend.issues_tokens() {
            warn!(
                "backend '{}' cannot store session tokens, disabling token issuing",
                backend.name()
            );
            issue_tokens = false;
        }

        let hash = hash::select(auth.algorithm.as_deref());
        let scheme = authn::from_config(auth, hash, Arc::clone(&backend))?;

        if auth.impersonate {
            #[cfg(not(all(feature = "impersonation", unix)))]
            {
                return Err(Error::Initialization(
                    "impersonation is not compiled in, rebuild with the 'impersonation' feature"
                        .to_string(),
                ));
            }
            #[cfg(all(feature = "impersonation", unix))]
            {
                // Effective uid/gid are process-wide; overlapping clients
                // would leak one user's credentials into another's requests.
                if !config.server.exclusive {
                    return Err(Error::Initialization(
                        "impersonation requires server.exclusive = true".to_string(),
                    ));
                }
            }
        }

        let protect_globs = if auth.protect.trim().is_empty() {
            "*"
        } else {
            auth.protect.as_str()
        };

        info!(
            "{MODULE_NAME}: {} scheme with {} backend",
            scheme.scheme_name(),
            backend.name()
        );

        Ok(Arc::new(Self {
            scheme,
            backend,
            options: IdentityOptions {
                issue_tokens,
                identity_headers: auth.identity_headers,
                identity_cookies: auth.identity_cookies,
                home_redirect: auth.home_redirect,
                #[cfg(all(feature = "impersonation", unix))]
                impersonate: auth.impersonate,
            },
            protect: UrlPattern::compile(protect_globs),
            unprotect: UrlPattern::compile(&auth.unprotect),
            redirect: auth.redirect.as_deref().map(RedirectTarget::new),
            expire: auth.expire,
            header_logout: auth.header_logout,
            redirect_head_check: auth.redirect_head_check,
        }))
    }

    /// Build the per-connection context. Scheme setup runs last so the
    /// connector slots exist before the driver sees the client.
    pub fn attach(self: &Arc<Self>, remote: SocketAddr) -> ClientCtx {
        ClientCtx::new(Arc::clone(self), remote)
    }
}
