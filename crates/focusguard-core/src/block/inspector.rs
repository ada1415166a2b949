//! Process enumeration and termination.
//!
//! The monitor talks to the OS through the [`ProcessInspector`] trait so
//! scan logic can be driven by fakes in tests. The real implementation sits
//! on `sysinfo`. Enumeration and termination can take hundreds of
//! milliseconds and belong on a blocking worker, never on the tick task.

use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::error::ProcessError;

/// A running process as seen by one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// Seam between the scan pass and the OS.
pub trait ProcessInspector: Send {
    /// Snapshot of currently running processes.
    fn running_processes(&mut self) -> Result<Vec<ProcessInfo>, ProcessError>;

    /// Terminate one process, waiting at most `wait` for it to exit.
    /// Returns `Ok(true)` if the process is gone, `Ok(false)` if the kill
    /// was delivered but the process outlived the wait.
    fn terminate(&mut self, pid: u32, wait: Duration) -> Result<bool, ProcessError>;
}

/// `sysinfo`-backed inspector.
pub struct SystemInspector {
    system: System,
}

impl SystemInspector {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemInspector {
    fn default() -> Self {
        Self::new()
    }
}


impl ProcessInspector for SystemInspector {
    fn running_processes(&mut self) -> Result<Vec<ProcessInfo>, ProcessError> {
        self.system
            .refresh_processes(ProcessesToUpdate::All, true);
        Ok(self
            .system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().into_owned(),
            })
            .collect())
    }

    fn terminate(&mut self, pid: u32, wait: Duration) -> Result<bool, ProcessError> {
        let sys_pid = Pid::from_u32(pid);
        let Some(process) = self.system.process(sys_pid) else {
            // Already exited between scan and kill.
            return Ok(true);
        };
        if !process.kill() {
            return Err(ProcessError::AccessDenied { pid });
        }

        // Poll for exit; a process that survives the wait is reported as
        // not terminated rather than waited on indefinitely.
        let deadline = std::time::Instant::now() + wait;
        loop {
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
            if self.system.process(sys_pid).is_none() {
                return Ok(true);
            }
            if std::time::Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}
