//! Session listing via the systemd-logind `DBus` interface.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use tracing::trace;
use zbus::Connection;
use zbus::zvariant::OwnedObjectPath;
use zbus::zvariant::OwnedValue;
use zbus::zvariant::Value;

use super::LogindSession;
use super::SessionLister;
use super::SessionProperties;
use crate::error::CheckError;

/// `DBus` service and path for login1.
const LOGIND_SERVICE: &str = "org.freedesktop.login1";
const LOGIND_PATH: &str = "/org/freedesktop/login1";
const MANAGER_INTERFACE: &str = "org.freedesktop.login1.Manager";
const SESSION_INTERFACE: &str = "org.freedesktop.login1.Session";
const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Row of `Manager.ListSessions`: id, uid, user name, seat, object path.
type SessionRow = (String, u32, String, String, OwnedObjectPath);

/// Lists logind sessions over the system bus.
#[derive(Debug, Default)]
pub struct LogindClient;

impl LogindClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionLister for LogindClient {
    async fn list_sessions(&self) -> Result<Vec<LogindSession>, CheckError> {
        let conn = Connection::system()
            .await
            .map_err(|e| CheckError::temporary(format!("Failed to connect to system DBus: {e}")))?;

        let rows = list_session_rows(&conn).await?;
        debug!("logind reports {} sessions", rows.len());

        let mut sessions = Vec::with_capacity(rows.len());
        for (id, _uid, _user, _seat, path) in rows {
            let properties = get_session_properties(&conn, path.as_str()).await?;
            trace!("Session {} properties: {:?}", id, properties);
            sessions.push(LogindSession::new(id, properties));
        }

        Ok(sessions)
    }
}

/// Call `Manager.ListSessions`.
async fn list_session_rows(conn: &Connection) -> Result<Vec<SessionRow>, CheckError> {
    let proxy = zbus::Proxy::new(conn, LOGIND_SERVICE, LOGIND_PATH, MANAGER_INTERFACE)
        .await
        .map_err(|e| CheckError::temporary(format!("Failed to create Manager proxy: {e}")))?;

    proxy
        .call("ListSessions", &())
        .await
        .map_err(|e| CheckError::temporary(format!("ListSessions call failed: {e}")))
}

/// Fetch all properties of a session object.
async fn get_session_properties(
    conn: &Connection,
    session_path: &str,
) -> Result<SessionProperties, CheckError> {
    let proxy = zbus::Proxy::new(conn, LOGIND_SERVICE, session_path, PROPERTIES_INTERFACE)
        .await
        .map_err(|e| CheckError::temporary(format!("Failed to create Properties proxy: {e}")))?;

    let values: HashMap<String, OwnedValue> = proxy
        .call("GetAll", &(SESSION_INTERFACE,))
        .await
        .map_err(|e| {
            CheckError::temporary(format!("Failed to get properties of {session_path}: {e}"))
        })?;

    Ok(values
        .into_iter()
        .filter_map(|(name, value)| match render_value(&value) {
            Some(rendered) => Some((name, rendered)),
            None => {
                trace!("Ignoring compound session property {}", name);
                None
            }
        })
        .collect())
}

/// Render a scalar property the way `loginctl show-session` prints it.
fn render_value(value: &Value<'_>) -> Option<String> {
    let rendered = match value {
        Value::Bool(b) => if *b { "yes" } else { "no" }.to_string(),
        Value::Str(s) => s.as_str().to_string(),
        Value::ObjectPath(p) => p.as_str().to_string(),
        Value::U8(n) => n.to_string(),
        Value::U16(n) => n.to_string(),
        Value::U32(n) => n.to_string(),
        Value::U64(n) => n.to_string(),
        Value::I16(n) => n.to_string(),
        Value::I32(n) => n.to_string(),
        Value::I64(n) => n.to_string(),
        Value::F64(n) => n.to_string(),
        Value::Value(inner) => return render_value(inner),
        _ => return None,
    };
    Some(rendered)
}
