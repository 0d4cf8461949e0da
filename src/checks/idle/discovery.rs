//! Discovery of running X sessions.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::warn;

use super::XSession;
use crate::error::CheckError;
use crate::host::AccountDatabase;
use crate::host::SessionLister;

/// How X sessions are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMethod {
    /// Scan the X11 socket directory.
    Sockets,
    /// Ask logind for sessions with a display.
    Logind,
}

impl FromStr for DiscoveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sockets" => Ok(Self::Sockets),
            "logind" => Ok(Self::Logind),
            other => Err(format!("Unknown session discovery method {other}")),
        }
    }
}

/// Lists the X sessions currently running on this host.
#[async_trait]
pub trait SessionDiscovery: Send + Sync + std::fmt::Debug {
    async fn discover(&self) -> Result<Vec<XSession>, CheckError>;
}

/// Finds sessions from the `X<n>` sockets of running X servers.
///
/// Assumes every X server runs as the user of its session.
#[derive(Debug)]
pub struct SocketDiscovery {
    dir: PathBuf,
    accounts: Arc<dyn AccountDatabase>,
}

impl SocketDiscovery {
    pub fn new(dir: PathBuf, accounts: Arc<dyn AccountDatabase>) -> Self {
        Self { dir, accounts }
    }

    /// Socket paths starting with `X`, sorted by name.
    fn list_sockets(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", self.dir.display(), e);
                return Vec::new();
            }
        };

        let mut sockets: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with('X'))
            })
            .collect();
        sockets.sort();
        sockets
    }

    fn session_for(&self, socket: &Path) -> Option<XSession> {
        let Some(display) = socket
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_socket_display)
        else {
            warn!(
                "Cannot parse display number from socket {}. Skipping.",
                socket.display()
            );
            return None;
        };

        let owner = match fs::metadata(socket) {
            Ok(metadata) => metadata.uid(),
            Err(e) => {
                warn!(
                    "Cannot stat socket {}: {}. Skipping.",
                    socket.display(),
                    e
                );
                return None;
            }
        };

        let Some(user) = self.accounts.user_name(owner) else {
            warn!(
                "Cannot get the owning user from socket {}. Skipping.",
                socket.display()
            );
            return None;
        };

        Some(XSession::new(display, user))
    }
}

#[async_trait]
impl SessionDiscovery for SocketDiscovery {
    async fn discover(&self) -> Result<Vec<XSession>, CheckError> {
        let sockets = self.list_sockets();
        debug!("Found sockets: {:?}", sockets);

        Ok(sockets
            .iter()
            .filter_map(|socket| self.session_for(socket))
            .collect())
    }
}

/// Finds sessions through logind's `Name` and `Display` properties.
#[derive(Debug)]
pub struct LogindDiscovery {
    sessions: Arc<dyn SessionLister>,
}

impl LogindDiscovery {
    pub fn new(sessions: Arc<dyn SessionLister>) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl SessionDiscovery for LogindDiscovery {
    async fn discover(&self) -> Result<Vec<XSession>, CheckError> {
        let mut results = Vec::new();

        for session in self.sessions.list_sessions().await? {
            let (Some(name), Some(display_str)) = (session.property("Name"), session.property("Display"))
            else {
                debug!(
                    "Skipping session {} because it does not contain a user name and a display",
                    session.id
                );
                continue;
            };

            if display_str.is_empty() {
                debug!("Skipping session {} without a display", session.id);
                continue;
            }

            match parse_logind_display(display_str) {
                Some(number) => results.push(XSession::new(number, name)),
                None => warn!(
                    "Unable to parse display {:?} of session {}",
                    display_str, session.id
                ),
            }
        }

        Ok(results)
    }
}

/// `X7` -> 7
fn parse_socket_display(file_name: &str) -> Option<u32> {
    file_name.strip_prefix('X')?.parse().ok()
}

/// `:3` -> 3
fn parse_logind_display(display: &str) -> Option<u32> {
    display.strip_prefix(':').unwrap_or(display).parse().ok()
}
