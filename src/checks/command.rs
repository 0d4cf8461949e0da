//! Checks backed by external programs.

use std::sync::Arc;

use tracing::debug;

use super::Configurable;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::CheckError;
use crate::error::ConfigurationError;
use crate::host::CommandOutput;
use crate::host::CommandRequest;
use crate::host::CommandRunner;
use crate::host::Host;

/// Run a command, treating a failure to start it as severe.
async fn run(runner: &dyn CommandRunner, request: &CommandRequest) -> Result<CommandOutput, CheckError> {
    debug!("Running {}", request.display());
    runner.run(request).await.map_err(CheckError::severe)
}

/// Active while a shell command exits successfully.
#[derive(Debug)]
pub struct ExternalCommand {
    command: String,
    runner: Arc<dyn CommandRunner>,
}

impl ExternalCommand {
    pub fn new(command: String, runner: Arc<dyn CommandRunner>) -> Self {
        Self { command, runner }
    }

    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        let request = CommandRequest::new("sh").arg("-c").arg(&self.command);
        let output = run(self.runner.as_ref(), &request).await?;

        if output.success {
            Ok(Evaluation::active(format!("Command {} succeeded", self.command)))
        } else {
            debug!("Command {} exited with {:?}", self.command, output.code);
            Ok(Evaluation::Inactive)
        }
    }
}

impl Configurable for ExternalCommand {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["command"])?;
        Ok(Self::new(
            section.required_string("command")?,
            host.commands.clone(),
        ))
    }
}

/// Active while any of the hosts answers a single ping.
#[derive(Debug)]
pub struct Ping {
    hosts: Vec<String>,
    runner: Arc<dyn CommandRunner>,
}

impl Ping {
    pub fn new(hosts: Vec<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self { hosts, runner }
    }

    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        for host in &self.hosts {
            let request = CommandRequest::new("ping")
                .arg("-q")
                .arg("-c")
                .arg("1")
                .arg(host);
            if run(self.runner.as_ref(), &request).await?.success {
                debug!("Host {} appears to be up", host);
                return Ok(Evaluation::active(format!("Host {host} is up")));
            }
        }

        Ok(Evaluation::Inactive)
    }
}

impl Configurable for Ping {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["hosts"])?;
        Ok(Self::new(section.required_list("hosts")?, host.commands.clone()))
    }
}

/// Active while Samba reports connected clients.
#[derive(Debug)]
pub struct Smb {
    runner: Arc<dyn CommandRunner>,
}

impl Smb {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        let request = CommandRequest::new("smbstatus").arg("-b");
        let output = run(self.runner.as_ref(), &request).await?;
        if !output.success {
            return Err(CheckError::severe(format!(
                "smbstatus exited with {:?}: {}",
                output.code,
                output.stderr.trim()
            )));
        }

        debug!("Received status output:\n{}", output.stdout);

        let connections = parse_smbstatus(&output.stdout);
        if connections.is_empty() {
            Ok(Evaluation::Inactive)
        } else {
            Ok(Evaluation::active(format!(
                "SMB clients are connected:\n{}",
                connections.join("\n")
            )))
        }
    }
}

impl Configurable for Smb {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&[])?;
        Ok(Self::new(host.commands.clone()))
    }
}

/// Non-blank lines following the `----` separator.
fn parse_smbstatus(output: &str) -> Vec<&str> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("----"))
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .collect()
}
