use std::sync::Arc;

use tracing::debug;

use super::Configurable;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::ConfigurationError;
use crate::host::Host;
use crate::host::LoadAverage;

pub const DEFAULT_THRESHOLD: f64 = 2.5;

/// Active while the five minute load average exceeds a threshold.
#[derive(Debug)]
pub struct Load {
    threshold: f64,
    load: Arc<dyn LoadAverage>,
}

impl Load {
    pub fn new(threshold: f64, load: Arc<dyn LoadAverage>) -> Self {
        Self { threshold, load }
    }

    pub fn check(&self) -> Evaluation {
        let current = self.load.load_average()[1];
        debug!("Load: {}", current);

        if current > self.threshold {
            Evaluation::active(format!("Load {} > threshold {}", current, self.threshold))
        } else {
            Evaluation::Inactive
        }
    }
}

impl Configurable for Load {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["threshold"])?;
        Ok(Self::new(
            section.float_or("threshold", DEFAULT_THRESHOLD)?,
            host.load.clone(),
        ))
    }
}
