use crate::registry::Origin;

/// Destination for reports about cleanup actions that failed during drain.
///
/// Reporting is observational only. It never changes what the wrapped
/// function returns or raises.
pub trait CleanupSink {
    fn report(&self, origin: Origin, message: &str);
}

/// Default sink which reports through the `log` facade
pub struct LogSink;

impl CleanupSink for LogSink {
    fn report(&self, origin: Origin, message: &str) {
        log::error!("defer call in {} raised: {}", origin, message);
    }
}
