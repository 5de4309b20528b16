/// Result type alias for registration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised when a cleanup cannot be registered.
///
/// Failures of the cleanup actions themselves are never an [`Error`]: they
/// are reported through the scope's [`CleanupSink`](crate::CleanupSink) and
/// swallowed, so the wrapped function's own result always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No wrapped scope is active on this thread
    #[error("no enclosing defer scope; wrap the calling function with with_defer")]
    NotInScope,
    /// The owning scope has already started draining
    #[error("defer scope has already drained")]
    RegistryClosed,
}
