use futures::future::BoxFuture;
use std::sync::Arc;
use stirling_core::{Measurement, Result};

/// Something that produces one measurement per sampling tick.
///
/// Implementations extract the value from whatever the upstream returns.
/// Errors are reported as [`stirling_core::StirlingError::Fetch`] and only
/// skip the current tick.
pub trait DataSource: Send + Sync {
    /// Configured key, e.g. `"wind"` or `"agents"`.
    fn id(&self) -> &str;

    fn fetch(&self) -> BoxFuture<'_, Result<Measurement>>;

    /// Downstream forwarder for accepted samples, if the source has one.
    fn sink(&self) -> Option<Arc<dyn Sink>> {
        None
    }
}

/// Receives every accepted raw sample. Failures never affect control state.
pub trait Sink: Send + Sync {
    fn send(&self, value: Measurement) -> BoxFuture<'_, Result<()>>;
}
