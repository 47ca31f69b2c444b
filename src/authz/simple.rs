use std::collections::HashMap;

use async_trait::async_trait;

use super::{AuthzBackend, TokenTable};
use crate::configuration::SimpleBackendConfig;
use crate::server::error::Error;

struct SimpleUser {
    secret: String,
    group: Option<String>,
    home: Option<String>,
}

/// In-memory backend fed directly from the configuration file. Session tokens
/// live in a process-local table and disappear on restart.
pub struct SimpleBackend {
    users: HashMap<String, SimpleUser>,
    tokens: TokenTable,
}

impl SimpleBackend {
    pub fn new(config: &SimpleBackendConfig) -> Self {
        let users = config
            .users
            .iter()
            .map(|(name, user)| {
                let user = SimpleUser {
                    secret: user.password.clone(),
                    group: user.group.clone(),
                    home: user.home.clone(),
                };
                (name.clone(), user)
            })
            .collect();

        Self {
            users,
            tokens: TokenTable::new(),
        }
    }
}

#[async_trait]
impl AuthzBackend for SimpleBackend {
    fn name(&self) -> &'static str {
        "simple"
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
