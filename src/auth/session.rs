use serde::Serialize;

/// Registration name of the authentication module; also the key under which
/// the identity record travels with admitted requests.
pub const MODULE_NAME: &str = "auth";

pub const STATUS_ACTIVATED: &str = "activated";

/// User names longer than this are truncated when the session is built.
const USER_MAX: usize = 32;

/// Per-client identity record.
///
/// Built lazily on the first successful verification of a connection and kept
/// on the connection context until disconnect; admitted requests carry an
/// `Arc<AuthSession>` in their extensions so downstream handlers can read it.
#[derive(Clone, Debug, Serialize)]
pub struct AuthSession {
    pub user: String,
    pub group: Option<String>,
    pub home: Option<String>,
    /// Wire name of the scheme that verified the client ("Basic", "Digest", ...).
    pub scheme: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub status: String,
}

impl AuthSession {
    pub fn new(user: &str, scheme: &str) -> Self {
        let mut user = user.to_string();
        if user.len() > USER_MAX {
            // Back off to a character boundary; byte 32 may land inside a
            // multi-byte character.
            let mut end = USER_MAX;
            while !user.is_char_boundary(end) {
                end -= 1;
            }
            user.truncate(end);
        }

        Self {
            user,
            group: None,
            home: None,
            scheme: scheme.to_string(),
            token: None,
            status: STATUS_ACTIVATED.to_string(),
        }
    }
}
