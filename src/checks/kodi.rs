//! Kodi media center via its JSON-RPC interface.

use std::time::Duration;

use serde_json::Value;
use serde_json::json;
use tracing::debug;

use super::Configurable;
use super::http::Endpoint;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::CheckError;
use crate::error::ConfigurationError;
use crate::host::Host;

pub const DEFAULT_URL: &str = "http://localhost:8080/jsonrpc";

/// Seconds without input after which Kodi counts as idle.
pub const DEFAULT_IDLE_TIME: u64 = 120;

/// Issue a JSON-RPC call and return its `result` member.
async fn call(endpoint: &Endpoint, method: &str, params: Option<Value>) -> Result<Value, CheckError> {
    let mut request = json!({"jsonrpc": "2.0", "id": 1, "method": method});
    if let Some(params) = params {
        request["params"] = params;
    }

    let mut reply: Value = endpoint
        .get_json(&[("request", request.to_string().as_str())])
        .await?;
    debug!("Kodi replied to {}: {}", method, reply);

    match reply.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(CheckError::temporary(format!("No result in reply to {method}"))),
    }
}

/// Active while Kodi has an active player.
#[derive(Debug)]
pub struct Kodi {
    endpoint: Endpoint,
}

impl Kodi {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConfigurationError> {
        Ok(Self {
            endpoint: Endpoint::new(url, timeout)?,
        })
    }

    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        let players = call(&self.endpoint, "Player.GetActivePlayers", None).await?;
        match players {
            Value::Array(players) if players.is_empty() => Ok(Evaluation::Inactive),
            Value::Array(_) => Ok(Evaluation::active("Kodi currently playing")),
            other => Err(CheckError::temporary(format!(
                "Unexpected list of active players: {other}"
            ))),
        }
    }
}

impl Configurable for Kodi {
    fn create(section: &CheckSection, _host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["url", "timeout"])?;
        Ok(Self {
            endpoint: Endpoint::from_section(section, Some(DEFAULT_URL))?,
        })
    }
}

/// Active while someone used Kodi within the last `idle_time` seconds.
#[derive(Debug)]
pub struct KodiIdleTime {
    endpoint: Endpoint,
    idle_time: u64,
}

impl KodiIdleTime {
    pub fn new(url: &str, timeout: Duration, idle_time: u64) -> Result<Self, ConfigurationError> {
        Ok(Self {
            endpoint: Endpoint::new(url, timeout)?,
            idle_time,
        })
    }

    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        let condition = format!("System.IdleTime({})", self.idle_time);
        let result = call(
            &self.endpoint,
            "XBMC.GetInfoBooleans",
            Some(json!({"booleans": [condition]})),
        )
        .await?;

        match result.get(&condition).and_then(Value::as_bool) {
            Some(true) => Ok(Evaluation::Inactive),
            Some(false) => Ok(Evaluation::active("Someone interacts with Kodi")),
            None => Err(CheckError::temporary(format!(
                "No boolean {condition} in reply: {result}"
            ))),
        }
    }
}

impl Configurable for KodiIdleTime {
    fn create(section: &CheckSection, _host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["url", "timeout", "idle_time"])?;
        Ok(Self {
            endpoint: Endpoint::from_section(section, Some(DEFAULT_URL))?,
            idle_time: section.unsigned_or("idle_time", DEFAULT_IDLE_TIME)?,
        })
    }
}
