use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::warn;

use super::AuthzBackend;
use crate::configuration::UnixBackendConfig;
use crate::server::error::Error;

struct PasswdEntry {
    gid: u32,
    home: String,
}

/// System account backend reading passwd- and group-format files
/// (`name:x:uid:gid:gecos:home:shell`, `name:x:gid:members`).
///
/// Secrets come from an optional shadow-format companion file
/// (`user:secret` per line); system crypt(3) digests are not verifiable
/// here, so without that file the backend only resolves groups and home
/// directories. There is no token storage: issuing session tokens with this
/// backend is disabled at module creation.
pub struct UnixBackend {
    users: HashMap<String, PasswdEntry>,
    groups: HashMap<u32, String>,
    secrets: HashMap<String, String>,
}

impl UnixBackend {
    pub fn open(config: &UnixBackendConfig) -> Result<Self, Error> {
        let users = parse_passwd(&config.passwd_path)?;
        let groups = parse_groups(&config.group_path);

        let secrets = match &config.shadow_path {
            Some(path) => parse_secrets(path)?,
            None => HashMap::new(),
        };

        Ok(Self {
            users,
            groups,
            secrets,
        })
    }
}

fn parse_passwd(path: &Path) -> Result<HashMap<String, PasswdEntry>, Error> {
    let contents = fs::read_to_string(path).map_err(|e| {
        Error::Initialization(format!("cannot read passwd file {}: {e}", path.display()))
    })?;

    let mut users = HashMap::new();
    for line in contents.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 7 {
            continue;
        }

        let Ok(gid) = fields[3].parse::<u32>() else {
            warn!("passwd entry for '{}' has a malformed gid", fields[0]);
            continue;
        };

        let entry = PasswdEntry {
            gid,
            home: fields[5].to_string(),
        };
        users.insert(fields[0].to_string(), entry);
    }

    Ok(users)
}

fn parse_groups(path: &Path) -> HashMap<u32, String> {
    let Ok(contents) = fs::read_to_string(path) else {
        warn!("cannot read group file {}", path.display());
        return HashMap::new();
    };

    let mut groups = HashMap::new();
    for line in contents.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 3 {
            continue;
        }

        if let Ok(gid) = fields[2].parse::<u32>() {
            groups.insert(gid, fields[0].to_string());
        }
    }

    groups
}

fn parse_secrets(path: &Path) -> Result<HashMap<String, String>, Error> {
    let contents = fs::read_to_string(path).map_err(|e| {
        Error::Initialization(format!("cannot read shadow file {}: {e}", path.display()))
    })?;

    let mut secrets = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((user, secret)) = line.split_once(':') {
            let secret = secret.split(':').next().unwrap_or(secret);
            secrets.insert(user.to_string(), secret.to_string());
        }
    }

    Ok(secrets)
}

#[async_trait]
impl AuthzBackend for UnixBackend {
    fn name(&self) -> &'static str {
        "unix"
    }

    async fn user_secret(&self, user: &str) -> Option<String> {
        self.secrets.get(user).cloned()
    }

    async fn group(&self, user: &str) -> Option<String> {
        let entry = self.users.get(user)?;
        self.groups.get(&entry.gid).cloned()
    }

    async fn home(&self, user: &str) -> Option<String> {
        self.users
            .get(user)
            .map(|entry| entry.home.clone())
            .filter(|home| !home.is_empty())
    }
}
