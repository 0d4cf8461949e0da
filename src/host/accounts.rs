//! User account lookups through the system password database.

use std::path::PathBuf;

use nix::unistd::Uid;
use nix::unistd::User;
use tracing::debug;

use super::AccountDatabase;

/// Account database backed by `getpwuid_r`/`getpwnam_r`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAccounts;

impl AccountDatabase for SystemAccounts {
    fn user_name(&self, uid: u32) -> Option<String> {
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(user) => user.map(|u| u.name),
            Err(e) => {
                debug!("Password database lookup for uid {} failed: {}", uid, e);
                None
            }
        }
    }

    fn home_dir(&self, user: &str) -> Option<PathBuf> {
        match User::from_name(user) {
            Ok(entry) => entry.map(|u| u.dir),
            Err(e) => {
                debug!("Password database lookup for {} failed: {}", user, e);
                None
            }
        }
    }
}
