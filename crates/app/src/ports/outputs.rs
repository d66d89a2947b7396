//! Output port — the physical lines that open zone valves.

use sprinkler_domain::error::SprinklerError;
use sprinkler_domain::id::OutputPin;

/// Drives output lines. Calls are immediate and idempotent.
pub trait OutputDriver: Send + Sync {
    /// Prepare `output` for use and leave it inactive.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Output`] when the line cannot be configured.
    fn configure(&self, output: OutputPin) -> Result<(), SprinklerError>;

    /// Switch `output` on or off.
    ///
    /// # Errors
    ///
    /// Returns [`SprinklerError::Output`] when the line cannot be driven.
    fn set_output(&self, output: OutputPin, active: bool) -> Result<(), SprinklerError>;
}

impl<T: OutputDriver> OutputDriver for std::sync::Arc<T> {
    fn configure(&self, output: OutputPin) -> Result<(), SprinklerError> {
        (**self).configure(output)
    }

    fn set_output(&self, output: OutputPin, active: bool) -> Result<(), SprinklerError> {
        (**self).set_output(output, active)
    }
}
