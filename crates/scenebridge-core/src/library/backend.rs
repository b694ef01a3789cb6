//! OS-level loader primitives behind a swappable interface.
//!
//! The production implementation rides on `libloading`, which selects the
//! Windows loader or the POSIX `dlopen` family per target. Tests substitute
//! counting fakes to observe open/resolve traffic without touching the OS.

use std::ffi::c_void;
use std::path::Path;

use crate::error::{Error, Result};

/// Raw address of a resolved native export.
///
/// The address stays valid only while the owning [`LoadedModule`] is alive;
/// the library manager guarantees that by keeping every symbol inside the
/// load session that owns the module handle.
#[derive(Debug, Clone, Copy)]
pub struct RawSymbol(*const c_void);

// SAFETY: a symbol address is an opaque pointer into a process-wide mapping;
// it carries no thread affinity.
unsafe impl Send for RawSymbol {}
unsafe impl Sync for RawSymbol {}

impl RawSymbol {
    /// Wrap a raw export address.
    pub fn new(address: *const c_void) -> Self {
        RawSymbol(address)
    }

    /// Reinterpret the address as a typed `extern "C"` function pointer.
    ///
    /// # Safety
    ///
    /// `F` must be a function-pointer type matching the export's actual
    /// signature, and the module that resolved this symbol must still be
    /// loaded.
    pub unsafe fn cast<F: Copy>(self) -> F {
        debug_assert_eq!(
            std::mem::size_of::<F>(),
            std::mem::size_of::<*const c_void>(),
            "RawSymbol::cast target must be pointer-sized"
        );
        std::mem::transmute_copy(&self.0)
    }
}

/// Opens shared libraries. One backend is selected per manager instance and
/// fixed for its lifetime.
pub trait LoaderBackend: Send + Sync {
    /// Open the shared library at `path`. Failure carries the OS diagnostic
    /// text and is the only fatal condition in the loading core.
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedModule>>;
}

/// A successfully opened shared library. Dropping the module closes the OS
/// handle.
pub trait LoadedModule: Send + Sync {
    /// Resolve an exported symbol by name. `None` when the export does not
    /// exist; never an error.
    fn symbol(&self, name: &str) -> Option<RawSymbol>;
}

/// Production loader backed by `libloading`.
pub struct SystemLoader;

impl LoaderBackend for SystemLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedModule>> {
        let library = open_native(path).map_err(|e| Error::LoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(SystemModule { library }))
    }
}

// POSIX targets bind eagerly (RTLD_NOW) so missing transitive symbols
// surface at load time instead of at first call.
#[cfg(unix)]
fn open_native(path: &Path) -> std::result::Result<libloading::Library, libloading::Error> {
    use libloading::os::unix::{Library, RTLD_LOCAL, RTLD_NOW};
    unsafe { Library::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Into::into)
}

#[cfg(windows)]
fn open_native(path: &Path) -> std::result::Result<libloading::Library, libloading::Error> {
    unsafe { libloading::Library::new(path) }
}

struct SystemModule {
    library: libloading::Library,
}

impl LoadedModule for SystemModule {
    fn symbol(&self, name: &str) -> Option<RawSymbol> {
        // The symbol is read as a plain address; typing happens at the call
        // site via `RawSymbol::cast`.
        let address = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        Some(RawSymbol::new(*address as *const c_void))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_library_reports_os_diagnostic() {
        let err = SystemLoader
            .open(Path::new("/nonexistent/libscenebridge-missing.so"))
            .err()
            .unwrap();
        match err {
            Error::LoadFailed { path, reason } => {
                assert!(path.ends_with("libscenebridge-missing.so"));
                assert!(!reason.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_raw_symbol_cast_roundtrip() {
        unsafe extern "C" fn probe() -> u32 {
            41
        }

        let symbol = RawSymbol::new(probe as *const c_void);
        let func: unsafe extern "C" fn() -> u32 = unsafe { symbol.cast() };
        assert_eq!(unsafe { func() }, 41);
    }
}
