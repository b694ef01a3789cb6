//! Shared fakes: a counting loader backend and a counting log-callback
//! host, so lifecycle and logging behavior is observable without a real
//! native library.

// Each test binary uses a different subset of the helpers.
#![allow(dead_code)]

use std::ffi::c_void;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use scenebridge_core::library::backend::{LoadedModule, LoaderBackend, RawSymbol};
use scenebridge_core::logging::LogCallbackHost;
use scenebridge_core::{Error, Result};

unsafe extern "C" fn noop() {}

pub struct CountingModule {
    resolves: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

impl LoadedModule for CountingModule {
    fn symbol(&self, _name: &str) -> Option<RawSymbol> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        Some(RawSymbol::new(noop as *const c_void))
    }
}

impl Drop for CountingModule {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Loader that resolves every symbol and counts traffic. Paths containing
/// `fail_marker` refuse to open, standing in for a missing file.
pub struct CountingLoader {
    pub opens: Arc<AtomicUsize>,
    pub resolves: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
    pub fail_marker: Option<&'static str>,
}

impl CountingLoader {
    pub fn new() -> Self {
        CountingLoader {
            opens: Arc::new(AtomicUsize::new(0)),
            resolves: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
            fail_marker: None,
        }
    }

    pub fn failing_on(marker: &'static str) -> Self {
        CountingLoader {
            fail_marker: Some(marker),
            ..CountingLoader::new()
        }
    }
}

impl LoaderBackend for CountingLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn LoadedModule>> {
        if let Some(marker) = self.fail_marker {
            if path.to_string_lossy().contains(marker) {
                return Err(Error::LoadFailed {
                    path: path.to_path_buf(),
                    reason: "no such file or directory".into(),
                });
            }
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingModule {
            resolves: self.resolves.clone(),
            closed: self.closed.clone(),
        }))
    }
}

/// Log-callback host that counts native install/remove calls.
pub struct CountingHost {
    pub installs: Arc<AtomicUsize>,
    pub removes: Arc<AtomicUsize>,
}

impl CountingHost {
    pub fn new() -> Self {
        CountingHost {
            installs: Arc::new(AtomicUsize::new(0)),
            removes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (self.installs.clone(), self.removes.clone())
    }
}

impl LogCallbackHost for CountingHost {
    fn install(&self) -> Result<()> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self) {
        self.removes.fetch_add(1, Ordering::SeqCst);
    }
}
