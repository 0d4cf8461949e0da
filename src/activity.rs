//! The check contract and one evaluation cycle over a set of checks.

use tracing::Instrument;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::info_span;
use tracing::warn;

use crate::checks::ActiveCalendarEvent;
use crate::checks::ActiveConnection;
use crate::checks::ExternalCommand;
use crate::checks::Kodi;
use crate::checks::KodiIdleTime;
use crate::checks::Load;
use crate::checks::LogindSessionsIdle;
use crate::checks::Mpd;
use crate::checks::NetworkBandwidth;
use crate::checks::Ping;
use crate::checks::Processes;
use crate::checks::Smb;
use crate::checks::Users;
use crate::checks::XIdleTime;
use crate::checks::XPath;
use crate::error::CheckError;

/// Outcome of a single check evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// The host is in use; carries a human-readable reason.
    Active(String),
    Inactive,
}

impl Evaluation {
    pub fn active(reason: impl Into<String>) -> Self {
        Self::Active(reason.into())
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Active(reason) => Some(reason),
            Self::Inactive => None,
        }
    }
}

impl From<Option<String>> for Evaluation {
    fn from(reason: Option<String>) -> Self {
        reason.map_or(Self::Inactive, Self::Active)
    }
}

/// All known kinds of activity checks.
#[derive(Debug)]
pub enum CheckKind {
    Calendar(ActiveCalendarEvent),
    Connection(ActiveConnection),
    ExternalCommand(ExternalCommand),
    IdleTime(XIdleTime),
    Kodi(Kodi),
    KodiIdleTime(KodiIdleTime),
    Load(Load),
    LogindIdle(LogindSessionsIdle),
    Mpd(Mpd),
    NetworkBandwidth(NetworkBandwidth),
    Ping(Ping),
    Processes(Processes),
    Smb(Smb),
    Users(Users),
    XPath(XPath),
}

macro_rules! check_kind_from {
    ($($variant:ident => $check:ty),* $(,)?) => {
        $(
            impl From<$check> for CheckKind {
                fn from(check: $check) -> Self {
                    Self::$variant(check)
                }
            }
        )*
    };
}

check_kind_from! {
    Calendar => ActiveCalendarEvent,
    Connection => ActiveConnection,
    ExternalCommand => ExternalCommand,
    IdleTime => XIdleTime,
    Kodi => Kodi,
    KodiIdleTime => KodiIdleTime,
    Load => Load,
    LogindIdle => LogindSessionsIdle,
    Mpd => Mpd,
    NetworkBandwidth => NetworkBandwidth,
    Ping => Ping,
    Processes => Processes,
    Smb => Smb,
    Users => Users,
    XPath => XPath,
}

/// A configured activity check.
#[derive(Debug)]
pub struct Check {
    name: String,
    kind: CheckKind,
}

impl Check {
    pub fn new(name: impl Into<String>, kind: impl Into<CheckKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &CheckKind {
        &self.kind
    }

    /// Run the activity test once.
    ///
    /// Takes `&mut self` because rate based checks keep their previous sample;
    /// a single instance therefore never has two evaluations in flight.
    pub async fn evaluate(&mut self) -> Result<Evaluation, CheckError> {
        let span = info_span!("check", name = %self.name);
        let kind = &mut self.kind;

        let result = async move {
            match kind {
                CheckKind::Calendar(check) => check.check().await,
                CheckKind::Connection(check) => Ok(check.check()),
                CheckKind::ExternalCommand(check) => check.check().await,
                CheckKind::IdleTime(check) => check.check().await,
                CheckKind::Kodi(check) => check.check().await,
                CheckKind::KodiIdleTime(check) => check.check().await,
                CheckKind::Load(check) => Ok(check.check()),
                CheckKind::LogindIdle(check) => check.check().await,
                CheckKind::Mpd(check) => check.check().await,
                CheckKind::NetworkBandwidth(check) => check.check(),
                CheckKind::Ping(check) => check.check().await,
                CheckKind::Processes(check) => Ok(check.check()),
                CheckKind::Smb(check) => check.check().await,
                CheckKind::Users(check) => Ok(check.check()),
                CheckKind::XPath(check) => check.check().await,
            }
        }
        .instrument(span)
        .await;

        match &result {
            Ok(Evaluation::Active(reason)) => debug!("Check {} matched: {}", self.name, reason),
            Ok(Evaluation::Inactive) => debug!("Check {} did not match", self.name),
            Err(CheckError::Temporary(message)) => {
                warn!("Check {} failed temporarily: {}", self.name, message);
            }
            Err(CheckError::Severe(message)) => {
                error!("Check {} failed severely: {}", self.name, message);
            }
        }

        result
    }
}

/// Result of one check within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: String,
    pub evaluation: Evaluation,
}

/// Evaluate checks in order, the way the suspend scheduler does each cycle.
///
/// Temporary failures count as inactive for this cycle. A severe failure
/// aborts the cycle. Unless `all` is set, evaluation stops at the first
/// active check.
pub async fn execute_checks(
    checks: &mut [Check],
    all: bool,
) -> Result<Vec<CheckOutcome>, CheckError> {
    let mut outcomes = Vec::with_capacity(checks.len());

    for check in checks.iter_mut() {
        let evaluation = match check.evaluate().await {
            Ok(evaluation) => evaluation,
            Err(CheckError::Temporary(_)) => Evaluation::Inactive,
            Err(error @ CheckError::Severe(_)) => return Err(error),
        };

        let matched = evaluation.is_active();
        if let Evaluation::Active(ref reason) = evaluation {
            info!("Check {} matched. Reason: {}", check.name(), reason);
        }
        outcomes.push(CheckOutcome {
            name: check.name().to_string(),
            evaluation,
        });

        if matched && !all {
            break;
        }
    }

    Ok(outcomes)
}
