use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::debug;

use super::Configurable;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::ConfigurationError;
use crate::host::Host;
use crate::host::NetworkStats;

/// Active while a client holds an established connection to one of `ports`.
///
/// Only connections whose local end is an address of this host count.
#[derive(Debug)]
pub struct ActiveConnection {
    ports: BTreeSet<u16>,
    network: Arc<dyn NetworkStats>,
}

impl ActiveConnection {
    pub fn new(ports: BTreeSet<u16>, network: Arc<dyn NetworkStats>) -> Self {
        Self { ports, network }
    }

    pub fn check(&self) -> Evaluation {
        let own_addresses: Vec<IpAddr> = self
            .network
            .interfaces()
            .into_iter()
            .flat_map(|interface| interface.addresses)
            .collect();

        let connected: Vec<String> = self
            .network
            .established_connections()
            .into_iter()
            .filter(|local| {
                self.ports.contains(&local.port())
                    && own_addresses.contains(&local.ip().to_canonical())
            })
            .map(|local| local.port().to_string())
            .collect();

        debug!("Connected local ports: {:?}", connected);

        if connected.is_empty() {
            Evaluation::Inactive
        } else {
            Evaluation::active(format!("Ports {} are connected", connected.join(", ")))
        }
    }
}

impl Configurable for ActiveConnection {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["ports"])?;
        let ports = section
            .required_list("ports")?
            .iter()
            .map(|port| {
                port.parse::<u16>()
                    .map_err(|_| ConfigurationError::invalid("ports", format!("{port} is not a port")))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self::new(ports, host.network.clone()))
    }
}
