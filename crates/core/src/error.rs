use thiserror::Error;

/// Top-level error type used across the entire controller.
///
/// A zero-width measurement range is not represented here: the duty mapper
/// resolves it to the idling duty instead of failing.
#[derive(Debug, Error)]
pub enum StirlingError {
    /// Missing or invalid configuration. Fatal, raised only at startup.
    #[error("config error: {0}")]
    Config(String),

    /// A single sampling tick could not produce a measurement.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// Forwarding a sample downstream failed. Never affects control state.
    #[error("sink error: {0}")]
    Sink(String),

    /// Writing the heater pin failed. Halts PWM for that pin.
    #[error("actuation error on pin {pin}: {reason}")]
    Actuation { pin: u32, reason: String },

    /// A background task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StirlingError {
    /// `true` for errors that must stop the control loop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Actuation { .. } | Self::Task(_))
    }
}

pub type Result<T, E = StirlingError> = std::result::Result<T, E>;
