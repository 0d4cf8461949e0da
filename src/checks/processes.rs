use std::sync::Arc;

use super::Configurable;
use crate::activity::Evaluation;
use crate::config::CheckSection;
use crate::error::ConfigurationError;
use crate::host::Host;
use crate::host::ProcessTable;

/// Active while a process with one of the configured names is running.
#[derive(Debug)]
pub struct Processes {
    processes: Vec<String>,
    table: Arc<dyn ProcessTable>,
}

impl Processes {
    pub fn new(processes: Vec<String>, table: Arc<dyn ProcessTable>) -> Self {
        Self { processes, table }
    }

    pub fn check(&self) -> Evaluation {
        self.table
            .processes()
            .iter()
            .find_map(|process| self.processes.iter().find(|name| **name == process.name))
            .map(|name| format!("Process {name} is running"))
            .into()
    }
}

impl Configurable for Processes {
    fn create(section: &CheckSection, host: &Host) -> Result<Self, ConfigurationError> {
        section.expect_options(&["processes"])?;
        Ok(Self::new(
            section.required_list("processes")?,
            host.processes.clone(),
        ))
    }
}
