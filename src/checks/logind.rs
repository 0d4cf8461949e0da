use std::sync::Arc;

use tracing::debug;

use super::Configurable;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::CheckError;
use crate::error::ConfigurationError;
use crate::host::Host;
use crate::host::SessionLister;

const DEFAULT_TYPES: &[&str] = &["tty", "x11", "wayland"];
const DEFAULT_STATES: &[&str] = &["active", "online"];

/// Active while a login session of an allowed type and state is not idle.
///
/// Relies on the `IdleHint` logind maintains for each session.
#[derive(Debug)]
pub struct LogindSessionsIdle {
    types: Vec<String>,
    states: Vec<String>,
    sessions: Arc<dyn SessionLister>,
}

impl LogindSessionsIdle {
    pub fn new(types: Vec<String>, states: Vec<String>, sessions: Arc<dyn SessionLister>) -> Self {
        Self {
            types,
            states,
            sessions,
        }
    }

    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        for session in self.sessions.list_sessions().await? {
            debug!("Session {} properties: {:?}", session.id, session.properties);

            let session_type = session.property("Type");
            if !session_type.is_some_and(|t| self.types.iter().any(|allowed| allowed == t)) {
                debug!("Ignoring session {} of type {:?}", session.id, session_type);
                continue;
            }

            let state = session.property("State");
            if !state.is_some_and(|s| self.states.iter().any(|allowed| allowed == s)) {
                debug!("Ignoring session {} in state {:?}", session.id, state);
                continue;
            }

            if session.property("IdleHint") == Some("no") {
                return Ok(Evaluation::active(format!(
                    "Login session {} is not idle",
                    session.id
                )));
            }
        }

        Ok(Evaluation::Inactive)
    }
}

impl Configurable for LogindSessionsIdle {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["types", "states"])?;
        Ok(Self::new(
            section.list_or("types", DEFAULT_TYPES)?,
            section.list_or("states", DEFAULT_STATES)?,
            host.sessions.clone(),
        ))
    }
}
