//! # sprinkler-adapter-virtual
//!
//! Simulated output lines for running the controller without valve hardware.
//!
//! Each line behaves like a GPIO: it must be configured before it can be
//! driven, and only lines `0..=max_line` exist. Switching is logged, so a
//! virtual controller can be followed from its trace output.
//!
//! ## Dependency rule
//!
//! Depends on `sprinkler-app` (port traits) and `sprinkler-domain` only.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use sprinkler_app::ports::OutputDriver;
use sprinkler_domain::error::SprinklerError;
use sprinkler_domain::id::OutputPin;

/// Highest line number of the default board.
pub const DEFAULT_MAX_LINE: u8 = 39;

/// Failure to drive a virtual line.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VirtualOutputError {
    #[error("line {line} does not exist (highest is {max})")]
    NoSuchLine { line: OutputPin, max: u8 },

    #[error("line {0} was driven before being configured")]
    NotConfigured(OutputPin),
}

impl From<VirtualOutputError> for SprinklerError {
    fn from(err: VirtualOutputError) -> Self {
        Self::Output(Box::new(err))
    }
}

/// In-memory bank of output lines.
#[derive(Debug)]
pub struct VirtualOutputs {
    max_line: u8,
    lines: Mutex<BTreeMap<OutputPin, bool>>,
}

impl Default for VirtualOutputs {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}

impl VirtualOutputs {
    #[must_use]
    pub fn new(max_line: u8) -> Self {
        Self {
            max_line,
            lines: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<OutputPin, bool>> {
        // Line levels stay meaningful even if a holder panicked.
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_line(&self, line: OutputPin) -> Result<(), VirtualOutputError> {
        if line.0 > self.max_line {
            return Err(VirtualOutputError::NoSuchLine {
                line,
                max: self.max_line,
            });
        }
        Ok(())
    }

    /// Lines currently driven on.
    #[must_use]
    pub fn active_lines(&self) -> Vec<OutputPin> {
        self.lock()
            .iter()
            .filter_map(|(line, on)| on.then_some(*line))
            .collect()
    }

    /// Level of `line`, or `None` if it was never configured.
    #[must_use]
    pub fn level(&self, line: OutputPin) -> Option<bool> {
        self.lock().get(&line).copied()
    }
}

impl OutputDriver for VirtualOutputs {
    fn configure(&self, output: OutputPin) -> Result<(), SprinklerError> {
        self.check_line(output)?;
        self.lock().insert(output, false);
        tracing::debug!(%output, "virtual line configured");
        Ok(())
    }

    fn set_output(&self, output: OutputPin, active: bool) -> Result<(), SprinklerError> {
        self.check_line(output)?;
        let mut lines = self.lock();
        let level = lines
            .get_mut(&output)
            .ok_or(VirtualOutputError::NotConfigured(output))?;
        if *level != active {
            *level = active;
            tracing::info!(%output, active, "virtual line switched");
        }
        Ok(())
    }
}
