use crate::{error::StirlingError, state::Measurement};

/// Messages flowing from the sampling schedule into the ingestor.
///
/// Produced once per sampling tick. The sampling task closes the channel on
/// shutdown instead of sending a sentinel.
#[derive(Debug)]
pub enum ControlEvent {
    /// A data source produced a measurement.
    Sample { source: String, value: Measurement },
    /// A data source failed for one tick; history and range stay untouched.
    FetchFailed { source: String, error: StirlingError },
}

impl ControlEvent {
    /// Wrap a fetch result for `source` into the matching event.
    ///
    /// A non-finite value is not a measurement and becomes `FetchFailed`.
    pub fn from_fetch(source: &str, result: Result<Measurement, StirlingError>) -> Self {
        match result {
            Ok(value) if !value.is_finite() => Self::FetchFailed {
                source: source.to_string(),
                error:  StirlingError::Fetch(format!("non-finite sample {value}")),
            },
            Ok(value) => Self::Sample { source: source.to_string(), value },
            Err(error) => Self::FetchFailed { source: source.to_string(), error },
        }
    }
}
