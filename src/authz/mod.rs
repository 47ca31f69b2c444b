pub mod simple;

#[cfg(feature = "authz-file")]
pub mod file;
#[cfg(feature = "authz-jwt")]
pub mod jwt;
#[cfg(feature = "authz-sqlite")]
pub mod sqlite;
#[cfg(feature = "authz-unix")]
pub mod unix;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::auth::session::AuthSession;
use crate::configuration::BackendConfig;
use crate::server::error::Error;

/// Authorization backend: resolves user names to stored secrets, groups and
/// home directories, and optionally stores or validates session tokens.
///
/// Capabilities beyond `user_secret` are optional; the default implementations
/// make their absence observable to the module without any driver-side
/// boilerplate. Backends are shared by every client of a server and must
/// handle their own locking.
#[async_trait]
pub trait AuthzBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// The stored secret the authentication scheme matches against.
    async fn user_secret(&self, user: &str) -> Option<String>;

    async fn group(&self, _user: &str) -> Option<String> {
        None
    }

    async fn home(&self, _user: &str) -> Option<String> {
        None
    }

    /// Whether [`AuthzBackend::join`] is implemented; probed once at module
    /// creation to decide if opaque session tokens can be issued.
    fn supports_join(&self) -> bool {
        false
    }

    /// Associate `token` with `user` for `expire_secs` seconds (0 = no expiry).
    async fn join(&self, _user: &str, _token: &str, _expire_secs: u64) -> Result<(), Error> {
        Err(Error::Execution(
            "backend does not store session tokens".to_string(),
        ))
    }

    /// Token-channel lookup: map a previously issued token back to its user.
    async fn check_token(&self, _token: &str) -> Option<String> {
        None
    }

    /// Rebuild a full session from a self-describing token.
    async fn session_from_token(&self, _token: &str) -> Option<AuthSession> {
        None
    }

    /// Whether the backend mints its own tokens (signed claims) instead of
    /// relying on the opaque generator plus `join`.
    fn issues_tokens(&self) -> bool {
        false
    }

    fn generate_token(&self, _session: &AuthSession, _expire_secs: u64) -> Option<String> {
        None
    }
}

/// Bind the configured backend, rejecting selections that were not compiled in.
pub fn from_config(config: &BackendConfig) -> Result<Arc<dyn AuthzBackend>, Error> {
    match config {
        BackendConfig::Simple(config) => Ok(Arc::new(simple::SimpleBackend::new(config))),
        #[cfg(feature = "authz-file")]
        BackendConfig::File(config) => Ok(Arc::new(file::FileBackend::open(config)?)),
        #[cfg(not(feature = "authz-file"))]
        BackendConfig::File(_) => Err(unavailable("file")),
        #[cfg(feature = "authz-unix")]
        BackendConfig::Unix(config) => Ok(Arc::new(unix::UnixBackend::open(config)?)),
        #[cfg(not(feature = "authz-unix"))]
        BackendConfig::Unix(_) => Err(unavailable("unix")),
        #[cfg(feature = "authz-sqlite")]
        BackendConfig::Sqlite(config) => Ok(Arc::new(sqlite::SqliteBackend::open(config)?)),
        #[cfg(not(feature = "authz-sqlite"))]
        BackendConfig::Sqlite(_) => Err(unavailable("sqlite")),
        #[cfg(feature = "authz-jwt")]
        BackendConfig::Jwt(config) => Ok(Arc::new(jwt::JwtBackend::new(config))),
        #[cfg(not(feature = "authz-jwt"))]
        BackendConfig::Jwt(_) => Err(unavailable("jwt")),
    }
}

#[allow(dead_code)]
fn unavailable(name: &str) -> Error {
    Error::Initialization(format!(
        "authorization backend '{name}' is not compiled in, change configuration"
    ))
}

struct TokenEntry {
    user: String,
    expires_at: Option<DateTime<Utc>>,
}

/// In-memory token store shared by the backends that have no durable session
/// storage of their own. Expired entries are pruned on lookup.
pub(crate) struct TokenTable {
    entries: RwLock<HashMap<String, TokenEntry>>,
}

impl TokenTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn insert(&self, user: &str, token: &str, expire_secs: u64) {
        let expires_at = expires_at(expire_secs);
        let entry = TokenEntry {
            user: user.to_string(),
            expires_at,
        };

        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(token.to_string(), entry);
    }

    pub(crate) fn lookup(&self, token: &str) -> Option<String> {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };

        let expired = entries
            .get(token)?
            .expires_at
            .is_some_and(|expires_at| expires_at < Utc::now());

        if expired {
            debug!("session token expired");
            entries.remove(token);
            return None;
        }

        entries.get(token).map(|entry| entry.user.clone())
    }
}

pub(crate) fn expires_at(expire_secs: u64) -> Option<DateTime<Utc>> {
    if expire_secs == 0 {
        return None;
    }

    let lifetime = Duration::seconds(i64::try_from(expire_secs).unwrap_or(i64::MAX));
    Some(Utc::now() + lifetime)
}
