//! Activity checks.
//!
//! Each check type parses its own section with [`Configurable::create`] and
//! exposes a `check` method returning an [`Evaluation`](crate::activity::Evaluation).

mod calendar;
mod command;
mod connection;
mod http;
pub mod idle;
mod kodi;
mod load;
mod logind;
mod mpd;
mod network;
mod processes;
mod users;
mod xpath;

pub use calendar::ActiveCalendarEvent;
pub use command::ExternalCommand;
pub use command::Ping;
pub use command::Smb;
pub use connection::ActiveConnection;
pub use idle::XIdleTime;
pub use kodi::Kodi;
pub use kodi::KodiIdleTime;
pub use load::Load;
pub use logind::LogindSessionsIdle;
pub use mpd::Mpd;
pub use network::NetworkBandwidth;
pub use processes::Processes;
pub use users::Users;
pub use xpath::XPath;

use crate::config::CheckSection;
use crate::error::ConfigurationError;
use crate::host::Host;

/// Construction of a check from its configuration section.
pub trait Configurable: Sized {
    /// Validate the section and build the check.
    ///
    /// Only local queries are allowed here; nothing is sent over the network.
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError>;
}
