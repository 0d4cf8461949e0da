//! In-memory collaborators for unit tests.

use std::collections::HashMap;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::error::CheckError;
use crate::host::AccountDatabase;
use crate::host::CalendarParser;
use crate::host::CommandError;
use crate::host::CommandOutput;
use crate::host::CommandRequest;
use crate::host::CommandRunner;
use crate::host::Host;
use crate::host::InterfaceInfo;
use crate::host::LoadAverage;
use crate::host::LoginEntry;
use crate::host::LoginRecords;
use crate::host::LogindSession;
use crate::host::NetworkStats;
use crate::host::ProcessEntry;
use crate::host::ProcessTable;
use crate::host::SessionLister;

/// Build a logind session from property pairs.
pub fn session(id: &str, properties: &[(&str, &str)]) -> LogindSession {
    LogindSession::new(
        id,
        properties
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    )
}

#[derive(Debug, Default)]
pub struct FakeSessions {
    sessions: Vec<LogindSession>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeSessions {
    pub fn new(sessions: Vec<LogindSession>) -> Self {
        Self {
            sessions,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLister for FakeSessions {
    async fn list_sessions(&self) -> Result<Vec<LogindSession>, CheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(CheckError::temporary("system bus unavailable"));
        }
        Ok(self.sessions.clone())
    }
}

/// Command runner answering from canned outputs.
///
/// Programs without a canned output fail to spawn.
#[derive(Debug, Default)]
pub struct FakeRunner {
    responses: Mutex<HashMap<String, CommandOutput>>,
    calls: Mutex<Vec<CommandRequest>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, program: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .insert(program.to_string(), output);
    }

    /// Canned output used only when the command runs as `user`.
    pub fn respond_as(&self, program: &str, user: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .insert(format!("{program}@{user}"), output);
    }

    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(request.clone());
        let responses = self.responses.lock().unwrap();
        request
            .user
            .as_ref()
            .and_then(|user| responses.get(&format!("{}@{}", request.program, user)))
            .or_else(|| responses.get(&request.program))
            .cloned()
            .ok_or_else(|| CommandError::Spawn {
                program: request.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }
}

#[derive(Debug, Default)]
pub struct FakeAccounts {
    names: HashMap<u32, String>,
    homes: HashMap<String, PathBuf>,
}

impl FakeAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, uid: u32, name: &str, home: &str) -> Self {
        self.names.insert(uid, name.to_string());
        self.homes.insert(name.to_string(), PathBuf::from(home));
        self
    }
}

impl AccountDatabase for FakeAccounts {
    fn user_name(&self, uid: u32) -> Option<String> {
        self.names.get(&uid).cloned()
    }

    fn home_dir(&self, user: &str) -> Option<PathBuf> {
        self.homes.get(user).cloned()
    }
}

#[derive(Debug, Default)]
pub struct FakeProcesses {
    processes: Vec<ProcessEntry>,
}

impl FakeProcesses {
    /// Processes with unknown owners.
    pub fn named(names: &[&str]) -> Self {
        Self::owned(&names.iter().map(|n| (*n, None)).collect::<Vec<_>>())
    }

    pub fn owned(entries: &[(&str, Option<&str>)]) -> Self {
        Self {
            processes: entries
                .iter()
                .zip(1_u32..)
                .map(|((name, user), pid)| ProcessEntry {
                    pid,
                    name: (*name).to_string(),
                    user: user.map(str::to_string),
                })
                .collect(),
        }
    }
}

impl ProcessTable for FakeProcesses {
    fn processes(&self) -> Vec<ProcessEntry> {
        self.processes.clone()
    }
}

#[derive(Debug, Default)]
pub struct FakeLogins(pub Vec<LoginEntry>);

impl LoginRecords for FakeLogins {
    fn logged_in(&self) -> Vec<LoginEntry> {
        self.0.clone()
    }
}

#[derive(Debug, Default)]
pub struct FakeNetwork {
    interfaces: Mutex<Vec<InterfaceInfo>>,
    connections: Vec<SocketAddr>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_interface(self, name: &str, addresses: &[&str]) -> Self {
        self.interfaces.lock().unwrap().push(InterfaceInfo {
            name: name.to_string(),
            addresses: addresses
                .iter()
                .map(|a| a.parse::<IpAddr>().unwrap())
                .collect(),
            bytes_sent: 0,
            bytes_received: 0,
        });
        self
    }

    #[must_use]
    pub fn with_connection(mut self, local: &str) -> Self {
        self.connections.push(local.parse().unwrap());
        self
    }

    pub fn set_counters(&self, name: &str, sent: u64, received: u64) {
        let mut interfaces = self.interfaces.lock().unwrap();
        let interface = interfaces.iter_mut().find(|i| i.name == name).unwrap();
        interface.bytes_sent = sent;
        interface.bytes_received = received;
    }

    pub fn remove_interface(&self, name: &str) {
        self.interfaces.lock().unwrap().retain(|i| i.name != name);
    }
}

impl NetworkStats for FakeNetwork {
    fn interfaces(&self) -> Vec<InterfaceInfo> {
        self.interfaces.lock().unwrap().clone()
    }

    fn established_connections(&self) -> Vec<SocketAddr> {
        self.connections.clone()
    }
}

#[derive(Debug, Default)]
pub struct FakeLoad(pub [f64; 3]);

impl LoadAverage for FakeLoad {
    fn load_average(&self) -> [f64; 3] {
        self.0
    }
}

/// Calendar parser returning fixed event summaries.
#[derive(Debug, Default)]
pub struct FakeCalendar {
    events: Vec<String>,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl FakeCalendar {
    pub fn new(events: &[&str]) -> Self {
        Self {
            events: events.iter().map(|e| (*e).to_string()).collect(),
            seen: Mutex::default(),
        }
    }

    pub fn seen(&self) -> Vec<Vec<u8>> {
        self.seen.lock().unwrap().clone()
    }
}

impl CalendarParser for FakeCalendar {
    fn events_between(
        &self,
        data: &[u8],
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<String>, String> {
        self.seen.lock().unwrap().push(data.to_vec());
        Ok(self.events.clone())
    }
}

/// A host where nothing is running and nobody is logged in.
pub fn host() -> Host {
    Host {
        sessions: Arc::new(FakeSessions::default()),
        commands: Arc::new(FakeRunner::new()),
        accounts: Arc::new(FakeAccounts::new()),
        processes: Arc::new(FakeProcesses::default()),
        logins: Arc::new(FakeLogins::default()),
        network: Arc::new(FakeNetwork::new()),
        load: Arc::new(FakeLoad::default()),
        calendar: None,
        x11_socket_dir: PathBuf::from("/nonexistent/.X11-unix"),
    }
}
