//! Runtime bindings to a native 3D-asset import/export library.
//!
//! This crate loads the Assimp shared library at runtime (no compile-time
//! linkage), resolves its exported C functions into callable entry points
//! and layers safe, thread-aware wrappers on top: an import/export facade,
//! opaque scene handles and an attachable log-stream system.

pub mod config;
pub mod error;
pub mod importer;
pub mod library;
pub mod logging;
pub mod native;
pub mod platform;

pub use error::{Error, Result};
pub use importer::{ExportBlob, ExportFormat, Importer, PostProcess, Scene};
pub use library::{LibraryEvent, NativeLibrary};
pub use logging::{ConsoleLogSink, LogSink, LogStream, LogStreamRegistry};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{ImporterConfig, PropertyValue};
    pub use crate::error::{Error, Result};
    pub use crate::importer::{ExportBlob, ExportFormat, Importer, PostProcess, Scene};
    pub use crate::library::{LibraryEvent, NativeLibrary};
    pub use crate::logging::{ConsoleLogSink, LogSink, LogStream, LogStreamRegistry};
    pub use crate::native::api::{CompileFlags, LibraryVersion, NativeApi};
}
