//! Idle time of local X sessions.
//!
//! Sessions are discovered either from the X11 socket directory or from
//! logind, filtered by the exclusion rules, and then measured one by one
//! with `xprintidle` running as the session owner.

mod discovery;
mod exclusion;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub use discovery::DiscoveryMethod;
pub use discovery::LogindDiscovery;
pub use discovery::SessionDiscovery;
pub use discovery::SocketDiscovery;
pub use exclusion::ExclusionFilter;

use super::Configurable;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::CheckError;
use crate::error::ConfigurationError;
use crate::host::AccountDatabase;
use crate::host::CommandRequest;
use crate::host::CommandRunner;
use crate::host::Host;

/// Sessions idle for less than this many seconds are active.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// A pattern no string matches.
pub const NEVER_MATCH: &str = "a^";

const XPRINTIDLE: &str = "xprintidle";

/// An X display and the user owning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XSession {
    pub display: u32,
    pub user: String,
}

impl XSession {
    pub fn new(display: u32, user: impl Into<String>) -> Self {
        Self {
            display,
            user: user.into(),
        }
    }
}

/// Measures how long a session has been idle.
#[async_trait]
pub trait IdleTimeSource: Send + Sync + std::fmt::Debug {
    async fn idle_seconds(&self, session: &XSession) -> Result<f64, CheckError>;
}

/// Runs `xprintidle` as the session owner against the session's display.
#[derive(Debug)]
pub struct Xprintidle {
    commands: Arc<dyn CommandRunner>,
    accounts: Arc<dyn AccountDatabase>,
}

impl Xprintidle {
    pub fn new(commands: Arc<dyn CommandRunner>, accounts: Arc<dyn AccountDatabase>) -> Self {
        Self { commands, accounts }
    }

    /// Build the privileged invocation for a session.
    fn request(&self, session: &XSession) -> Result<CommandRequest, CheckError> {
        let home = self.accounts.home_dir(&session.user).ok_or_else(|| {
            CheckError::temporary(format!(
                "Cannot determine the home directory of user {}",
                session.user
            ))
        })?;

        Ok(CommandRequest::new(XPRINTIDLE)
            .as_user(&session.user)
            .env("DISPLAY", format!(":{}", session.display))
            .env(
                "XAUTHORITY",
                home.join(".Xauthority").to_string_lossy().into_owned(),
            ))
    }
}

#[async_trait]
impl IdleTimeSource for Xprintidle {
    async fn idle_seconds(&self, session: &XSession) -> Result<f64, CheckError> {
        let request = self.request(session)?;

        let output = self.commands.run(&request).await.map_err(|e| {
            warn!(
                "Unable to determine the idle time for display {}: {}",
                session.display, e
            );
            CheckError::temporary(e)
        })?;

        if !output.success {
            warn!(
                "Unable to determine the idle time for display {}: exit code {:?}",
                session.display, output.code
            );
            return Err(CheckError::temporary(format!(
                "{XPRINTIDLE} failed for display {} with exit code {:?}: {}",
                session.display,
                output.code,
                output.stderr.trim()
            )));
        }

        parse_idle_millis(&output.stdout).ok_or_else(|| {
            warn!(
                "Unable to parse idle time for display {} from {:?}",
                session.display,
                output.stdout.trim()
            );
            CheckError::temporary(format!(
                "Cannot parse idle time from {:?}",
                output.stdout.trim()
            ))
        })
    }
}

/// Parse a millisecond count and convert it to seconds.
fn parse_idle_millis(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(|ms| ms / 1000.0)
}

/// Active while any non-excluded X session was used within `timeout` seconds.
#[derive(Debug)]
pub struct XIdleTime {
    timeout: u64,
    discovery: Arc<dyn SessionDiscovery>,
    exclusion: ExclusionFilter,
    idle: Arc<dyn IdleTimeSource>,
}

impl XIdleTime {
    pub fn new(
        timeout: u64,
        discovery: Arc<dyn SessionDiscovery>,
        exclusion: ExclusionFilter,
        idle: Arc<dyn IdleTimeSource>,
    ) -> Self {
        Self {
            timeout,
            discovery,
            exclusion,
            idle,
        }
    }

    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub async fn check(&self) -> Result<Evaluation, CheckError> {
        #[allow(clippy::cast_precision_loss)]
        let threshold = self.timeout as f64;

        for session in self.discovery.discover().await? {
            info!(
                "Checking display {} of user {}",
                session.display, session.user
            );

            if self.exclusion.excludes(&session) {
                continue;
            }

            let idle_time = self.idle.idle_seconds(&session).await?;
            debug!(
                "Idle time for display {} of user {} is {} seconds.",
                session.display, session.user, idle_time
            );

            if idle_time < threshold {
                return Ok(Evaluation::active(format!(
                    "X session {} of user {} has idle time {} < threshold {}",
                    session.display, session.user, idle_time, self.timeout
                )));
            }
        }

        Ok(Evaluation::Inactive)
    }
}

impl Configurable for XIdleTime {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["timeout", "method", "ignore_if_process", "ignore_users"])?;

        let timeout = section.unsigned_or("timeout", DEFAULT_TIMEOUT_SECS)?;
        let method: DiscoveryMethod = section
            .string_or("method", "sockets")?
            .parse()
            .map_err(|reason| ConfigurationError::invalid("method", reason))?;

        let discovery: Arc<dyn SessionDiscovery> = match method {
            DiscoveryMethod::Sockets => Arc::new(SocketDiscovery::new(
                host.x11_socket_dir.clone(),
                host.accounts.clone(),
            )),
            DiscoveryMethod::Logind => Arc::new(LogindDiscovery::new(host.sessions.clone())),
        };

        let exclusion = ExclusionFilter::new(
            section.regex_or("ignore_users", NEVER_MATCH)?,
            section.regex_or("ignore_if_process", NEVER_MATCH)?,
            host.processes.clone(),
        );

        let idle = Arc::new(Xprintidle::new(host.commands.clone(), host.accounts.clone()));

        Ok(Self::new(timeout, discovery, exclusion, idle))
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::MetadataExt;

    use tempfile::TempDir;

    use super::*;
    use crate::host::CommandOutput;
    use crate::testing;
    use crate::testing::FakeAccounts;
    use crate::testing::FakeProcesses;
    use crate::testing::FakeRunner;

    /// Socket directory with the given entries, all owned by the current user.
    fn socket_dir(entries: &[&str]) -> (TempDir, u32) {
        let dir = TempDir::new().unwrap();
        for entry in entries {
            std::fs::write(dir.path().join(entry), b"").unwrap();
        }
        let uid = std::fs::metadata(dir.path()).unwrap().uid();
        (dir, uid)
    }

    struct Fixture {
        _dir: TempDir,
        host: Host,
        runner: Arc<FakeRunner>,
    }

    fn fixture(entries: &[&str], processes: FakeProcesses) -> Fixture {
        let (dir, uid) = socket_dir(entries);
        let runner = Arc::new(FakeRunner::new());
        let host = Host {
            commands: runner.clone(),
            accounts: Arc::new(FakeAccounts::new().with_user(uid, "alice", "/home/alice")),
            processes: Arc::new(processes),
            x11_socket_dir: dir.path().to_path_buf(),
            ..testing::host()
        };
        Fixture {
            _dir: dir,
            host,
            runner,
        }
    }

    fn create(host: &Host, body: &str) -> XIdleTime {
        let section = CheckSection::parse("XIdleTime", body).unwrap();
        XIdleTime::create(&section, host).unwrap()
    }

    #[tokio::test]
    async fn test_recent_input_is_active() {
        let fixture = fixture(&["X7"], FakeProcesses::default());
        fixture
            .runner
            .respond("xprintidle", CommandOutput::success("120000\n"));
        let check = create(&fixture.host, "timeout = 300");

        let evaluation = check.check().await.unwrap();
        assert_eq!(
            evaluation.reason(),
            Some("X session 7 of user alice has idle time 120 < threshold 300")
        );
    }

    #[tokio::test]
    async fn test_long_idle_is_inactive() {
        let fixture = fixture(&["X7"], FakeProcesses::default());
        fixture
            .runner
            .respond("xprintidle", CommandOutput::success("400000\n"));
        let check = create(&fixture.host, "timeout = 300");

        assert_eq!(check.check().await.unwrap(), Evaluation::Inactive);
    }

    #[tokio::test]
    async fn test_idle_equal_to_timeout_is_inactive() {
        let fixture = fixture(&["X7"], FakeProcesses::default());
        fixture
            .runner
            .respond("xprintidle", CommandOutput::success("300000"));
        let check = create(&fixture.host, "timeout = 300");

        assert_eq!(check.check().await.unwrap(), Evaluation::Inactive);
    }

    #[tokio::test]
    async fn test_idle_query_environment() {
        let fixture = fixture(&["X7"], FakeProcesses::default());
        fixture
            .runner
            .respond("xprintidle", CommandOutput::success("1000"));
        let check = create(&fixture.host, "");
        check.check().await.unwrap();

        let calls = fixture.runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "xprintidle");
        assert_eq!(calls[0].user.as_deref(), Some("alice"));
        assert_eq!(
            calls[0].env,
            vec![
                ("DISPLAY".to_string(), ":7".to_string()),
                (
                    "XAUTHORITY".to_string(),
                    "/home/alice/.Xauthority".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_ignored_user_is_never_probed() {
        let fixture = fixture(&["X7"], FakeProcesses::default());
        fixture
            .runner
            .respond("xprintidle", CommandOutput::success("0"));
        let check = create(&fixture.host, r#"ignore_users = "ali.*""#);

        assert_eq!(check.check().await.unwrap(), Evaluation::Inactive);
        assert!(fixture.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ignored_process_skips_session() {
        let processes = FakeProcesses::owned(&[("bash", Some("alice")), ("kodi.bin", Some("alice"))]);
        let fixture = fixture(&["X7"], processes);
        fixture
            .runner
            .respond("xprintidle", CommandOutput::success("10"));
        let check = create(&fixture.host, r#"ignore_if_process = "kodi.*""#);

        assert_eq!(check.check().await.unwrap(), Evaluation::Inactive);
        assert!(fixture.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ignored_process_of_other_user_does_not_skip() {
        let processes = FakeProcesses::owned(&[("kodi.bin", Some("bob")), ("kodi.bin", None)]);
        let fixture = fixture(&["X7"], processes);
        fixture
            .runner
            .respond("xprintidle", CommandOutput::success("10"));
        let check = create(&fixture.host, r#"ignore_if_process = "kodi.*""#);

        assert!(check.check().await.unwrap().is_active());
    }

    #[tokio::test]
    async fn test_first_active_session_wins() {
        let fixture = fixture(&["X0", "X1"], FakeProcesses::default());
        fixture
            .runner
            .respond("xprintidle", CommandOutput::success("5"));
        let check = create(&fixture.host, "");

        let evaluation = check.check().await.unwrap();
        assert!(evaluation.reason().unwrap().starts_with("X session 0 "));
        assert_eq!(fixture.runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_no_sessions_is_inactive() {
        let fixture = fixture(&[], FakeProcesses::default());
        let check = create(&fixture.host, "");

        assert_eq!(check.check().await.unwrap(), Evaluation::Inactive);
    }

    #[tokio::test]
    async fn test_failing_helper_is_temporary() {
        let fixture = fixture(&["X7"], FakeProcesses::default());
        let check = create(&fixture.host, "");

        assert!(matches!(
            check.check().await,
            Err(CheckError::Temporary(_))
        ));
    }

    #[tokio::test]
    async fn test_helper_exit_code_is_temporary() {
        let fixture = fixture(&["X7"], FakeProcesses::default());
        fixture
            .runner
            .respond("xprintidle", CommandOutput::failure(1));
        let check = create(&fixture.host, "");

        assert!(matches!(
            check.check().await,
            Err(CheckError::Temporary(_))
        ));
    }

    #[tokio::test]
    async fn test_unparsable_idle_time_is_temporary() {
        let fixture = fixture(&["X7"], FakeProcesses::default());
        fixture
            .runner
            .respond("xprintidle", CommandOutput::success("couldn't open display"));
        let check = create(&fixture.host, "");

        assert!(matches!(
            check.check().await,
            Err(CheckError::Temporary(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_home_is_temporary() {
        let runner = Arc::new(FakeRunner::new());
        runner.respond("xprintidle", CommandOutput::success("10"));
        let idle = Xprintidle::new(runner.clone(), Arc::new(FakeAccounts::new()));

        assert!(matches!(
            idle.idle_seconds(&XSession::new(7, "alice")).await,
            Err(CheckError::Temporary(_))
        ));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_logind_method() {
        let sessions = Arc::new(testing::FakeSessions::new(vec![testing::session(
            "2",
            &[("Name", "bob"), ("Display", ":3")],
        )]));
        let runner = Arc::new(FakeRunner::new());
        runner.respond_as("xprintidle", "bob", CommandOutput::success("2000"));
        let host = Host {
            sessions: sessions.clone(),
            commands: runner.clone(),
            accounts: Arc::new(FakeAccounts::new().with_user(1001, "bob", "/home/bob")),
            ..testing::host()
        };
        let check = create(&host, r#"method = "logind""#);

        let evaluation = check.check().await.unwrap();
        assert_eq!(
            evaluation.reason(),
            Some("X session 3 of user bob has idle time 2 < threshold 600")
        );
        assert_eq!(sessions.calls(), 1);
    }

    #[test]
    fn test_defaults() {
        let check = create(&testing::host(), "");
        assert_eq!(check.timeout(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_invalid_method() {
        let section = CheckSection::parse("XIdleTime", r#"method = "utmp""#).unwrap();
        assert!(matches!(
            XIdleTime::create(&section, &testing::host()),
            Err(ConfigurationError::InvalidValue { key, .. }) if key == "method"
        ));
    }

    #[test]
    fn test_invalid_regex() {
        let section = CheckSection::parse("XIdleTime", r#"ignore_users = "[""#).unwrap();
        assert!(matches!(
            XIdleTime::create(&section, &testing::host()),
            Err(ConfigurationError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_parse_idle_millis() {
        assert_eq!(parse_idle_millis("120000\n"), Some(120.0));
        assert_eq!(parse_idle_millis(" 1500 "), Some(1.5));
        assert_eq!(parse_idle_millis(""), None);
        assert_eq!(parse_idle_millis("-5"), None);
        assert_eq!(parse_idle_millis("NaN"), None);
    }
}
