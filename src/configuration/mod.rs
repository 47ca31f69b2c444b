use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

mod error;

pub use error::Error;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    #[serde(default = "ServerConfig::default_query_timeout")]
    pub query_timeout: u64,
    #[serde(default = "ServerConfig::default_query_timeout_grace_period")]
    pub query_timeout_grace_period: u64,
    #[serde(default = "ServerConfig::default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Serve one connection at a time. Required by identity impersonation,
    /// which mutates process-wide credentials.
    #[serde(default)]
    pub exclusive: bool,
}

impl ServerConfig {
    fn default_bind_address() -> IpAddr {
        IpAddr::from(Ipv4Addr::UNSPECIFIED)
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_query_timeout() -> u64 {
        3600
    }

    fn default_query_timeout_grace_period() -> u64 {
        60
    }

    fn default_max_concurrent_requests() -> usize {
        4
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: Self::default_bind_address(),
            port: Self::default_port(),
            query_timeout: Self::default_query_timeout(),
            query_timeout_grace_period: Self::default_query_timeout_grace_period(),
            max_concurrent_requests: Self::default_max_concurrent_requests(),
            exclusive: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthnType {
    #[default]
    None,
    Basic,
    Digest,
    Bearer,
    OAuth2,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub scheme: AuthnType,
    pub backend: Option<BackendConfig>,
    #[serde(default = "AuthConfig::default_realm")]
    pub realm: String,
    /// Hash name from the registry; unknown names fall back to md5.
    pub algorithm: Option<String>,
    #[serde(default = "AuthConfig::default_protect")]
    pub protect: String,
    #[serde(default)]
    pub unprotect: String,
    /// Login page URL. When set, denied requests are redirected there with a
    /// 302 instead of being challenged with a 401, and the login URL itself
    /// is always admitted.
    pub redirect: Option<String>,
    /// Session token lifetime in seconds; 0 means no expiry.
    #[serde(default)]
    pub expire: u64,
    /// Issue a session token after the first successful verification.
    #[serde(default)]
    pub issue_tokens: bool,
    /// Propagate identity (and token) on response headers.
    #[serde(default)]
    pub identity_headers: bool,
    /// Propagate identity (and token) on cookies.
    #[serde(default)]
    pub identity_cookies: bool,
    /// Redirect authenticated users into their home directory.
    #[serde(default)]
    pub home_redirect: bool,
    /// Run request handling as the authenticated OS user. Requires the
    /// `impersonation` feature and `server.exclusive`.
    #[serde(default)]
    pub impersonate: bool,
    /// Treat a `WWW-Authenticate` request header as a logout. Non-standard
    /// convention kept for compatibility with existing clients.
    #[serde(default = "AuthConfig::default_header_logout")]
    pub header_logout: bool,
    /// Under `redirect`, verify credentials against the HEAD method instead
    /// of the real one, so a centralized login page can reuse one
    /// authorization value for every resource. This weakens per-resource
    /// credential binding; leave it off unless the login flow requires it.
    #[serde(default)]
    pub redirect_head_check: bool,
    /// Identity assumed when `scheme = "none"`.
    pub user: Option<String>,
    pub oauth2: Option<OAuth2Config>,
}

impl AuthConfig {
    fn default_realm() -> String {
        env!("CARGO_PKG_NAME").to_string()
    }

    fn default_protect() -> String {
        "*".to_string()
    }

    fn default_header_logout() -> bool {
        true
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            scheme: AuthnType::None,
            backend: None,
            realm: Self::default_realm(),
            algorithm: None,
            protect: Self::default_protect(),
            unprotect: String::new(),
            redirect: None,
            expire: 0,
            issue_tokens: false,
            identity_headers: false,
            identity_cookies: false,
            home_redirect: false,
            impersonate: false,
            header_logout: Self::default_header_logout(),
            redirect_head_check: false,
            user: None,
            oauth2: None,
        }
    }
}

/// Authorization backend selection. Every variant deserializes regardless of
/// compiled features; a backend that is not compiled in is rejected when the
/// module is created.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendConfig {
    Simple(SimpleBackendConfig),
    File(FileBackendConfig),
    Unix(UnixBackendConfig),
    Sqlite(SqliteBackendConfig),
    Jwt(JwtBackendConfig),
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SimpleBackendConfig {
    #[serde(default)]
    pub users: HashMap<String, SimpleUserConfig>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SimpleUserConfig {
    pub password: String,
    pub group: Option<String>,
    pub home: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileBackendConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UnixBackendConfig {
    #[serde(default = "UnixBackendConfig::default_passwd_path")]
    pub passwd_path: PathBuf,
    #[serde(default = "UnixBackendConfig::default_group_path")]
    pub group_path: PathBuf,
    /// Optional shadow-format file carrying verifiable secrets; without it
    /// the backend only resolves groups and home directories.
    pub shadow_path: Option<PathBuf>,
}

impl UnixBackendConfig {
    fn default_passwd_path() -> PathBuf {
        PathBuf::from("/etc/passwd")
    }

    fn default_group_path() -> PathBuf {
        PathBuf::from("/etc/group")
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SqliteBackendConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug, Deserialize)]
pub struct JwtBackendConfig {
    pub secret: String,
    pub issuer: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OAuth2Config {
    pub authorize_endpoint: String,
    pub client_id: Option<String>,
}

impl Configuration {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let config_str = fs::read_to_string(path)?;
        Self::load_from_str(&config_str)
    }

    pub fn load_from_str(slice: &str) -> Result<Self, Error> {
        let config: Configuration =
            toml::from_str(slice).map_err(|e| Error::InvalidFormat(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.auth.scheme == AuthnType::OAuth2 && self.auth.oauth2.is_none() {
            return Err(Error::InvalidFormat(
                "scheme 'oauth2' requires an [auth.oauth2] section".to_string(),
            ));
        }

        if self.auth.impersonate && !self.server.exclusive {
            return Err(Error::InvalidFormat(
                "impersonation mutates process-wide credentials and requires server.exclusive = true"
                    .to_string(),
            ));
        }

        Ok(())
    }
}
