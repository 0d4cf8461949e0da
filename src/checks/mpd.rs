//! Music Player Daemon over its line based text protocol.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::debug;

use super::Configurable;
use super::http::DEFAULT_TIMEOUT_SECS;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::CheckError;
use crate::error::ConfigurationError;
use crate::host::Host;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6600;

/// Active while MPD is playing.
#[derive(Debug)]
pub struct Mpd {
    host: String,
    port: u16,
    timeout: Duration,
}

impl Mpd {
    pub fn new(host: String, port: u16, timeout: Duration) -> Self {
        Self {
            host,
            port,
            timeout,
        }
    }

    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        let status = tokio::time::timeout(self.timeout, self.status())
            .await
            .map_err(|_| {
                CheckError::temporary(format!(
                    "MPD at {}:{} did not answer within {:?}",
                    self.host, self.port, self.timeout
                ))
            })??;

        debug!("MPD status: {:?}", status);
        if status.get("state").map(String::as_str) == Some("play") {
            Ok(Evaluation::active("MPD currently playing"))
        } else {
            Ok(Evaluation::Inactive)
        }
    }

    async fn status(&self) -> Result<HashMap<String, String>, CheckError> {
        let io_error = |e: std::io::Error| {
            CheckError::temporary(format!("MPD at {}:{}: {}", self.host, self.port, e))
        };

        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(io_error)?;
        let mut stream = BufReader::new(stream);

        let mut line = String::new();
        stream.read_line(&mut line).await.map_err(io_error)?;
        if !line.starts_with("OK MPD") {
            return Err(CheckError::temporary(format!(
                "Unexpected MPD greeting {:?}",
                line.trim_end()
            )));
        }

        stream.write_all(b"status\n").await.map_err(io_error)?;
        stream.flush().await.map_err(io_error)?;

        let mut status = HashMap::new();
        loop {
            line.clear();
            if stream.read_line(&mut line).await.map_err(io_error)? == 0 {
                return Err(CheckError::temporary("MPD closed the connection"));
            }

            let line = line.trim_end();
            if line == "OK" {
                break;
            }
            if line.starts_with("ACK") {
                return Err(CheckError::temporary(format!("MPD refused status: {line}")));
            }
            if let Some((key, value)) = line.split_once(": ") {
                status.insert(key.to_string(), value.to_string());
            }
        }

        // Best effort; the answer is already complete.
        let _ = stream.write_all(b"close\n").await;
        Ok(status)
    }
}

impl Configurable for Mpd {
    fn create(section: &CheckSection, _host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["host", "port", "timeout"])?;

        let port = section.integer_or("port", i64::from(DEFAULT_PORT))?;
        let port = u16::try_from(port)
            .map_err(|_| ConfigurationError::invalid("port", format!("{port} is not a port")))?;

        Ok(Self::new(
            section.string_or("host", DEFAULT_HOST)?,
            port,
            Duration::from_secs(section.unsigned_or("timeout", DEFAULT_TIMEOUT_SECS)?),
        ))
    }
}
