//! Unified error handling for scenebridge.

use std::path::PathBuf;

/// Unified error type for scenebridge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OS-level open of the native shared library failed. This is the
    /// only fatal condition in the loading core; the manager stays unloaded
    /// and a corrected `load` may be retried by the caller.
    #[error("failed to load native library from {}: {reason}", path.display())]
    LoadFailed {
        /// Path handed to the OS loader.
        path: PathBuf,
        /// OS diagnostic text (dlerror / GetLastError).
        reason: String,
    },

    /// A native export needed by the requested call was not resolved when
    /// the library was loaded.
    #[error("native export `{0}` is not available in the loaded library")]
    FunctionNotAvailable(&'static str),

    /// The native importer rejected the input; carries the native error
    /// string when one was available.
    #[error("import failed: {0}")]
    ImportFailed(String),

    /// The native exporter signaled failure.
    #[error("export failed: {0}")]
    ExportFailed(String),

    /// No native library implementation exists for the running OS.
    #[error("cannot determine a native library implementation for this platform")]
    UnsupportedPlatform,

    /// A caller-supplied value could not cross the C boundary.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;
