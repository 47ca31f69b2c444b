use nix::unistd::{getuid, setegid, seteuid, User};
use tracing::warn;

/// Switch the effective uid/gid to the authenticated user's account.
///
/// Only the effective ids move; the saved set-user-ID keeps the privilege
/// needed to switch again for the next client. Every failure is warned and
/// request handling continues with the previous credentials.
pub fn switch_user(user: &str) {
    let account = match User::from_name(user) {
        Ok(Some(account)) => account,
        Ok(None) => {
            warn!("no system account for '{user}'");
            return;
        }
        Err(e) => {
            warn!("account lookup for '{user}' failed: {e}");
            return;
        }
    };

    // Regain privilege first, then take the target group and user.
    if seteuid(getuid()).is_err() {
        warn!("not enough rights to change user");
    }
    if setegid(account.gid).is_err() {
        warn!("not enough rights to change group");
    }
    if seteuid(account.uid).is_err() {
        warn!("not enough rights to change user");
    }
}
