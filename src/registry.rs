//! Maps check class names to constructors and builds configured checks.

use tracing::debug;
use tracing::info;

use crate::activity::Check;
use crate::activity::CheckKind;
use crate::checks::ActiveCalendarEvent;
use crate::checks::ActiveConnection;
use crate::checks::Configurable;
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
use crate::config::CheckSection;
use crate::config::Config;
use crate::error::ConfigurationError;
use crate::host::Host;

type Constructor = fn(&CheckSection, &Host) -> Result<CheckKind, ConfigurationError>;

fn construct<T>(section: &CheckSection, host: &Host) -> Result<CheckKind, ConfigurationError>
where
    T: Configurable + Into<CheckKind>,
{
    T::create(section, host).map(Into::into)
}

const CLASSES: &[(&str, Constructor)] = &[
    ("calendar", construct::<ActiveCalendarEvent>),
    ("connection", construct::<ActiveConnection>),
    ("external-command", construct::<ExternalCommand>),
    ("idle-time", construct::<XIdleTime>),
    ("kodi", construct::<Kodi>),
    ("kodi-idle-time", construct::<KodiIdleTime>),
    ("load", construct::<Load>),
    ("logind-idle", construct::<LogindSessionsIdle>),
    ("mpd", construct::<Mpd>),
    ("network-bandwidth", construct::<NetworkBandwidth>),
    ("ping", construct::<Ping>),
    ("processes", construct::<Processes>),
    ("smb", construct::<Smb>),
    ("users", construct::<Users>),
    ("xpath", construct::<XPath>),
];

/// Names of all known check classes.
pub fn check_classes() -> impl Iterator<Item = &'static str> {
    CLASSES.iter().map(|(name, _)| *name)
}

/// Build the check described by `section`.
pub fn create(section: &CheckSection, host: &Host) -> Result<Check, ConfigurationError> {
    let build = || {
        let class = section.class()?;
        let constructor = CLASSES
            .iter()
            .find(|(name, _)| *name == class)
            .map(|(_, constructor)| constructor)
            .ok_or_else(|| ConfigurationError::UnknownClass(class.clone()))?;
        debug!("Creating check {} of class {}", section.name(), class);
        constructor(section, host)
    };

    build()
        .map(|kind| Check::new(section.name(), kind))
        .map_err(|e| e.in_check(section.name()))
}

/// Build all enabled checks in configuration order.
///
/// Any broken section fails the whole configuration.
pub fn set_up_checks(config: &Config, host: &Host) -> Result<Vec<Check>, ConfigurationError> {
    let mut checks = Vec::new();

    for section in config.sections()? {
        if !section.enabled().map_err(|e| e.in_check(section.name()))? {
            debug!("Skipping disabled check {}", section.name());
            continue;
        }
        checks.push(create(&section, host)?);
        info!("Configured check {}", section.name());
    }

    if checks.is_empty() {
        return Err(ConfigurationError::NoChecks);
    }
    Ok(checks)
}
