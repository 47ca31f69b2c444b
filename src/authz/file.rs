use std::collections::HashMap;
use std::fs;

use async_trait::async_trait;
use tracing::warn;

use super::{AuthzBackend, TokenTable};
use crate::configuration::FileBackendConfig;
use crate::server::error::Error;

struct FileUser {
    secret: String,
    group: Option<String>,
    home: Option<String>,
}

/// Flat-file backend. One record per line, colon-separated:
///
/// ```text
/// user:secret[:group[:home]]
/// ```
///
/// Blank lines and `#` comments are skipped. The file is read once when the
/// module is created; tokens live in a process-local table.
pub struct FileBackend {
    users: HashMap<String, FileUser>,
    tokens: TokenTable,
}

impl FileBackend {
    pub fn open(config: &FileBackendConfig) -> Result<Self, Error> {
        let contents = fs::read_to_string(&config.path).map_err(|e| {
            Error::Initialization(format!(
                "cannot read user file {}: {e}",
                config.path.display()
            ))
        })?;

        let mut users = HashMap::new();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.splitn(4, ':');
            let (Some(name), Some(secret)) = (fields.next(), fields.next()) else {
                warn!(
                    "{}:{}: malformed user record, skipping",
                    config.path.display(),
                    index + 1
                );
                continue;
            };

            let user = FileUser {
                secret: secret.to_string(),
                group: fields.next().filter(|s| !s.is_empty()).map(str::to_string),
                home: fields.next().filter(|s| !s.is_empty()).map(str::to_string),
            };
            users.insert(name.to_string(), user);
        }

        Ok(Self {
            users,
            tokens: TokenTable::new(),
        })
    }
}

#[async_trait]
impl AuthzBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn user_secret(&self, user: &str) -> Option<String> {
        self.users.get(user).map(|user| user.secret.clone())
    }

    async fn group(&self, user: &str) -> Option<String> {
        self.users.get(user).and_then(|user| user.group.clone())
    }

    async fn home(&self, user: &str) -> Option<String> {
        self.users.get(user).and_then(|user| user.home.clone())
    }

    fn supports_join(&self) -> bool {
        true
    }

    async fn join(&self, user: &str, token: &str, expire_secs: u64) -> Result<(), Error> {
        self.tokens.insert(user, token, expire_secs);
        Ok(())
    }

    async fn check_token(&self, token: &str) -> Option<String> {
        self.tokens.lookup(token)
    }
}
