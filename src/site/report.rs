use tracing::error;

use crate::error::AssetError;

/// Sink for failures that must not abort the surrounding operation.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &AssetError);
}

/// Logs each reported failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &AssetError) {
        error!(error = %err, "site file failed to load");
    }
}
