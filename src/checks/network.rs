use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::debug;

use super::Configurable;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::CheckError;
use crate::error::ConfigurationError;
use crate::host::Host;
use crate::host::NetworkStats;

pub const DEFAULT_THRESHOLD: f64 = 100.0;

/// Cumulative `(sent, received)` byte counters per interface.
type Counters = HashMap<String, (u64, u64)>;

#[derive(Debug)]
struct Sample {
    counters: Counters,
    taken: Instant,
}

impl Sample {
    fn take(network: &dyn NetworkStats) -> Self {
        Self {
            counters: network
                .interfaces()
                .into_iter()
                .map(|i| (i.name, (i.bytes_sent, i.bytes_received)))
                .collect(),
            taken: Instant::now(),
        }
    }
}

/// Active while an interface transfers more bytes per second than allowed.
///
/// Rates are computed against the sample of the previous evaluation, or of
/// construction for the first one.
#[derive(Debug)]
pub struct NetworkBandwidth {
    interfaces: Vec<String>,
    threshold_send: f64,
    threshold_receive: f64,
    network: Arc<dyn NetworkStats>,
    previous: Sample,
}

impl NetworkBandwidth {
    pub fn new(
        interfaces: Vec<String>,
        threshold_send: f64,
        threshold_receive: f64,
        network: Arc<dyn NetworkStats>,
    ) -> Self {
        let previous = Sample::take(network.as_ref());
        Self {
            interfaces,
            threshold_send,
            threshold_receive,
            network,
            previous,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn check(&mut self) -> Result<Evaluation, CheckError> {
        let current = Sample::take(self.network.as_ref());
        let previous = std::mem::replace(&mut self.previous, current);
        let current = &self.previous;
        let elapsed = current.taken.duration_since(previous.taken).as_secs_f64();

        for interface in &self.interfaces {
            let (Some(old), Some(new)) = (
                previous.counters.get(interface),
                current.counters.get(interface),
            ) else {
                return Err(CheckError::temporary(format!(
                    "Interface {interface} is missing"
                )));
            };

            let rate_send = new.0.saturating_sub(old.0) as f64 / elapsed;
            let rate_receive = new.1.saturating_sub(old.1) as f64 / elapsed;
            debug!(
                "Interface {}: sending {} byte/s, receiving {} byte/s",
                interface, rate_send, rate_receive
            );

            if rate_send > self.threshold_send {
                return Ok(Evaluation::active(format!(
                    "Interface {} sending rate {:.1} byte/s higher than threshold {}",
                    interface, rate_send, self.threshold_send
                )));
            }

            if rate_receive > self.threshold_receive {
                return Ok(Evaluation::active(format!(
                    "Interface {} receive rate {:.1} byte/s higher than threshold {}",
                    interface, rate_receive, self.threshold_receive
                )));
            }
        }

        Ok(Evaluation::Inactive)
    }
}

impl Configurable for NetworkBandwidth {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["interfaces", "threshold_send", "threshold_receive"])?;

        let interfaces = section.required_list("interfaces")?;
        let known: Vec<String> = host.network.interfaces().into_iter().map(|i| i.name).collect();
        if let Some(missing) = interfaces.iter().find(|name| !known.contains(name)) {
            return Err(ConfigurationError::invalid(
                "interfaces",
                format!("network interface {missing} does not exist"),
            ));
        }

        Ok(Self::new(
            interfaces,
            section.float_or("threshold_send", DEFAULT_THRESHOLD)?,
            section.float_or("threshold_receive", DEFAULT_THRESHOLD)?,
            host.network.clone(),
        ))
    }
}
