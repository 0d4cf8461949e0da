//! Snapshots of the local system: processes, logins, network and load.

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::DateTime;
use sysinfo::Networks;
use sysinfo::ProcessRefreshKind;
use sysinfo::ProcessesToUpdate;
use sysinfo::System;
use sysinfo::UpdateKind;
use sysinfo::Users;
use tracing::debug;
use tracing::trace;

use super::InterfaceInfo;
use super::LoadAverage;
use super::LoginEntry;
use super::LoginRecords;
use super::NetworkStats;
use super::ProcessEntry;
use super::ProcessTable;

/// TCP state code for established connections in `/proc/net/tcp`.
const TCP_ESTABLISHED: &str = "01";

const PROC_NET_TCP: [&str; 2] = ["/proc/net/tcp", "/proc/net/tcp6"];

/// The utmp API works on a process-wide cursor.
static UTMP_LOCK: Mutex<()> = Mutex::new(());

/// System information provider backed by `sysinfo` and procfs.
#[derive(Debug)]
pub struct LocalSystem {
    sys: Mutex<System>,
}

impl LocalSystem {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl Default for LocalSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for LocalSystem {
    fn processes(&self) -> Vec<ProcessEntry> {
        let mut sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_user(UpdateKind::OnlyIfNotSet),
        );
        let users = Users::new_with_refreshed_list();

        sys.processes()
            .values()
            .map(|process| ProcessEntry {
                pid: process.pid().as_u32(),
                name: process.name().to_string_lossy().into_owned(),
                user: process
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|user| user.name().to_string()),
            })
            .collect()
    }
}

impl LoginRecords for LocalSystem {
    fn logged_in(&self) -> Vec<LoginEntry> {
        let _guard = UTMP_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = Vec::new();

        // SAFETY: the utmp cursor is only touched while holding UTMP_LOCK and
        // every record is copied out before the next getutxent call.
        unsafe {
            libc::setutxent();
            loop {
                let record = libc::getutxent();
                if record.is_null() {
                    break;
                }
                let record = &*record;
                if record.ut_type != libc::USER_PROCESS {
                    continue;
                }
                entries.push(LoginEntry {
                    name: c_field(&record.ut_user),
                    terminal: c_field(&record.ut_line),
                    host: c_field(&record.ut_host),
                    started: DateTime::from_timestamp(i64::from(record.ut_tv.tv_sec), 0),
                });
            }
            libc::endutxent();
        }

        trace!("utmp lists {} logged-in users", entries.len());
        entries
    }
}

impl NetworkStats for LocalSystem {
    fn interfaces(&self) -> Vec<InterfaceInfo> {
        let networks = Networks::new_with_refreshed_list();
        networks
            .iter()
            .map(|(name, data)| InterfaceInfo {
                name: name.clone(),
                addresses: data.ip_networks().iter().map(|net| net.addr).collect(),
                bytes_sent: data.total_transmitted(),
                bytes_received: data.total_received(),
            })
            .collect()
    }

    fn established_connections(&self) -> Vec<SocketAddr> {
        let mut connections = Vec::new();
        for path in PROC_NET_TCP {
            match std::fs::read_to_string(path) {
                Ok(content) => connections.extend(
                    parse_proc_net_tcp(&content)
                        .into_iter()
                        .filter(|(_, state)| state == TCP_ESTABLISHED)
                        .map(|(addr, _)| addr),
                ),
                Err(e) => debug!("Cannot read {}: {}", path, e),
            }
        }
        connections
    }
}

impl LoadAverage for LocalSystem {
    fn load_average(&self) -> [f64; 3] {
        let load = System::load_average();
        [load.one, load.five, load.fifteen]
    }
}

/// Parse the local address and state column of `/proc/net/tcp{,6}`.
///
/// Lines that cannot be parsed are skipped.
pub fn parse_proc_net_tcp(content: &str) -> Vec<(SocketAddr, String)> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let local = fields.get(1)?;
            let state = fields.get(3)?;
            match parse_hex_endpoint(local) {
                Some(addr) => Some((addr, (*state).to_string())),
                None => {
                    debug!("Skipping unparsable socket line: {}", line.trim());
                    None
                }
            }
        })
        .collect()
}

/// Decode `0100007F:0016` style endpoints. Address words are in host order.
fn parse_hex_endpoint(endpoint: &str) -> Option<SocketAddr> {
    let (address, port) = endpoint.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;

    let ip = match address.len() {
        8 => {
            let word = u32::from_str_radix(address, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes()))
        }
        32 => {
            let mut octets = [0_u8; 16];
            for (i, chunk) in octets.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(address.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };

    Some(SocketAddr::new(ip, port))
}

/// Copy a NUL padded C character array into a `String`.
fn c_field(field: &[libc::c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .map(|c| u8::from_ne_bytes(c.to_ne_bytes()))
        .take_while(|b| *b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
