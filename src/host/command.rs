//! External command invocation.
//!
//! Commands that must run as another user are wrapped in `sudo -u`.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use tracing::trace;

use super::CommandError;
use super::CommandOutput;
use super::CommandRequest;
use super::CommandRunner;

/// Program used to drop privileges to the target user.
const PRIVILEGE_WRAPPER: &str = "sudo";

/// Runs commands as child processes of this process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput, CommandError> {
        let mut command = build_command(request);
        debug!("Running: {}", request.display());

        let output = command
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: request.program.clone(),
                source,
            })?
            .wait_with_output()
            .await
            .map_err(|source| CommandError::Wait {
                program: request.program.clone(),
                source,
            })?;

        trace!("{} exited with {:?}", request.program, output.status.code());

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Translate a request into a spawnable command.
fn build_command(request: &CommandRequest) -> Command {
    let mut command = match request.user {
        Some(ref user) => {
            let mut command = Command::new(PRIVILEGE_WRAPPER);
            command.arg("-u").arg(user).arg(&request.program);
            command
        }
        None => Command::new(&request.program),
    };

    command
        .args(&request.args)
        .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    command
}
