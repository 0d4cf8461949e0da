use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::Configurable;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::ConfigurationError;
use crate::host::Host;
use crate::host::LoginEntry;
use crate::host::LoginRecords;

/// Active while a user matching all three patterns is logged in.
#[derive(Debug)]
pub struct Users {
    name: Regex,
    terminal: Regex,
    host: Regex,
    logins: Arc<dyn LoginRecords>,
}

impl Users {
    pub fn new(name: Regex, terminal: Regex, host: Regex, logins: Arc<dyn LoginRecords>) -> Self {
        Self {
            name,
            terminal,
            host,
            logins,
        }
    }

    fn matches(&self, entry: &LoginEntry) -> bool {
        self.name.is_match(&entry.name)
            && self.terminal.is_match(&entry.terminal)
            && self.host.is_match(&entry.host)
    }

    pub fn check(&self) -> Evaluation {
        let Some(entry) = self.logins.logged_in().into_iter().find(|e| self.matches(e)) else {
            return Evaluation::Inactive;
        };

        debug!(
            "User {} on terminal {} from host {} matches criteria.",
            entry.name, entry.terminal, entry.host
        );

        let since = entry
            .started
            .map_or_else(|| "an unknown time".to_string(), |t| t.to_rfc3339());
        Evaluation::active(format!(
            "User {} is logged in on terminal {} from {} since {}",
            entry.name, entry.terminal, entry.host, since
        ))
    }
}

impl Configurable for Users {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["name", "terminal", "host"])?;
        Ok(Self::new(
            section.regex_or("name", ".*")?,
            section.regex_or("terminal", ".*")?,
            section.regex_or("host", ".*")?,
            host.logins.clone(),
        ))
    }
}
