//! activity-probe - decides whether a Linux host is in use.
//!
//! A configurable set of activity checks is evaluated against the running
//! system. Any active check means the host must not be suspended.

pub mod activity;
pub mod checks;
pub mod config;
pub mod error;
pub mod host;
pub mod registry;

#[cfg(test)]
mod testing;

pub use activity::Check;
pub use activity::CheckOutcome;
pub use activity::Evaluation;
pub use activity::execute_checks;
pub use config::Config;
pub use error::CheckError;
pub use error::ConfigurationError;
pub use host::Host;
pub use registry::set_up_checks;
