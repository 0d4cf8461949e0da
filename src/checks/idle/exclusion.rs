//! Rules that keep sessions from blocking suspension.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::XSession;
use crate::host::ProcessTable;

/// Skips sessions of ignored users and of users running ignored processes.
///
/// Both patterns must match the whole user or process name.
#[derive(Debug)]
pub struct ExclusionFilter {
    ignore_users: Regex,
    ignore_if_process: Regex,
    processes: Arc<dyn ProcessTable>,
}

impl ExclusionFilter {
    pub fn new(
        ignore_users: Regex,
        ignore_if_process: Regex,
        processes: Arc<dyn ProcessTable>,
    ) -> Self {
        Self {
            ignore_users,
            ignore_if_process,
            processes,
        }
    }

    /// Whether the idle time of `session` must not be considered.
    pub fn excludes(&self, session: &XSession) -> bool {
        if self.ignore_users.is_match(&session.user) {
            debug!("Skipping user '{}' due to request", session.user);
            return true;
        }

        self.runs_ignored_process(&session.user)
    }

    /// Processes whose owner is unknown never count.
    fn runs_ignored_process(&self, user: &str) -> bool {
        let matching = self
            .processes
            .processes()
            .into_iter()
            .filter(|process| process.user.as_deref() == Some(user))
            .find(|process| self.ignore_if_process.is_match(&process.name));

        match matching {
            Some(process) => {
                debug!(
                    "Process {} with pid {} matches the ignore regex '{}'. \
                     Skipping idle time check for user {}.",
                    process.name,
                    process.pid,
                    self.ignore_if_process.as_str(),
                    user
                );
                true
            }
            None => false,
        }
    }
}
