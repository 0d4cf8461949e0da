//! Collaborators the checks consume.
//!
//! Every piece of the surrounding system a check talks to sits behind one of
//! the traits below. [`Host::local`] wires up the implementations that talk
//! to the running Linux system; tests substitute fakes.

mod accounts;
mod command;
mod local;
mod logind;

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use thiserror::Error;

pub use accounts::SystemAccounts;
pub use command::ProcessRunner;
pub use local::LocalSystem;
pub use local::parse_proc_net_tcp;
pub use logind::LogindClient;

use crate::error::CheckError;

/// Directory holding the X11 server sockets.
pub const X11_SOCKET_DIR: &str = "/tmp/.X11-unix";

/// Properties of a logind session rendered as strings.
pub type SessionProperties = BTreeMap<String, String>;

/// A logind session and its properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogindSession {
    pub id: String,
    pub properties: SessionProperties,
}

impl LogindSession {
    pub fn new(id: impl Into<String>, properties: SessionProperties) -> Self {
        Self {
            id: id.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Lists the sessions known to the login manager.
#[async_trait]
pub trait SessionLister: Send + Sync + fmt::Debug {
    async fn list_sessions(&self) -> Result<Vec<LogindSession>, CheckError>;
}

/// An external command to run, optionally as another user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,

    /// Run the command as this user instead of the current one.
    pub user: Option<String>,

    /// Variables added to the inherited environment.
    pub env: Vec<(String, String)>,
}

impl CommandRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn as_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Human readable command line for log messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Result of a command that could be started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(code: i32) -> Self {
        Self {
            success: false,
            code: Some(code),
            ..Self::default()
        }
    }
}

/// Errors that prevent a command from producing output at all.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Runs external commands, possibly with dropped privileges.
#[async_trait]
pub trait CommandRunner: Send + Sync + fmt::Debug {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, CommandError>;
}

/// User account lookups.
pub trait AccountDatabase: Send + Sync + fmt::Debug {
    fn user_name(&self, uid: u32) -> Option<String>;
    fn home_dir(&self, user: &str) -> Option<PathBuf>;
}

/// A running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,

    /// Owning user, if it could be determined.
    pub user: Option<String>,
}

/// Point-in-time view of the process table.
pub trait ProcessTable: Send + Sync + fmt::Debug {
    fn processes(&self) -> Vec<ProcessEntry>;
}

/// A logged-in user as recorded in utmp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginEntry {
    pub name: String,
    pub terminal: String,
    pub host: String,
    pub started: Option<DateTime<Utc>>,
}

/// Login records of currently logged-in users.
pub trait LoginRecords: Send + Sync + fmt::Debug {
    fn logged_in(&self) -> Vec<LoginEntry>;
}

/// Addresses and cumulative byte counters of a network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub addresses: Vec<IpAddr>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Network interfaces and connections.
pub trait NetworkStats: Send + Sync + fmt::Debug {
    fn interfaces(&self) -> Vec<InterfaceInfo>;

    /// Local endpoints of all established TCP connections.
    fn established_connections(&self) -> Vec<SocketAddr>;
}

/// System load averages over 1, 5 and 15 minutes.
pub trait LoadAverage: Send + Sync + fmt::Debug {
    fn load_average(&self) -> [f64; 3];
}

/// Extracts events from calendar data.
pub trait CalendarParser: Send + Sync + fmt::Debug {
    /// Summaries of all events overlapping `[start, end)`.
    fn events_between(
        &self,
        data: &[u8],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<String>, String>;
}

/// Bundle of collaborators handed to check constructors.
#[derive(Debug, Clone)]
pub struct Host {
    pub sessions: Arc<dyn SessionLister>,
    pub commands: Arc<dyn CommandRunner>,
    pub accounts: Arc<dyn AccountDatabase>,
    pub processes: Arc<dyn ProcessTable>,
    pub logins: Arc<dyn LoginRecords>,
    pub network: Arc<dyn NetworkStats>,
    pub load: Arc<dyn LoadAverage>,

    /// No calendar support is available unless a parser is installed.
    pub calendar: Option<Arc<dyn CalendarParser>>,

    pub x11_socket_dir: PathBuf,
}

impl Host {
    /// Collaborators backed by the running system.
    pub fn local() -> Self {
        let system = Arc::new(LocalSystem::new());
        Self {
            sessions: Arc::new(LogindClient::new()),
            commands: Arc::new(ProcessRunner),
            accounts: Arc::new(SystemAccounts),
            processes: system.clone(),
            logins: system.clone(),
            network: system.clone(),
            load: system,
            calendar: None,
            x11_socket_dir: PathBuf::from(X11_SOCKET_DIR),
        }
    }
}
