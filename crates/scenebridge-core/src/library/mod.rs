//! Native-library lifecycle management.
//!
//! [`NativeLibrary`] owns at most one loaded shared-library handle at a
//! time, resolves the fixed export set into a [`FunctionTable`] and fires
//! lifecycle notifications around load/free. Loading is lazy: the first
//! native call goes through [`NativeLibrary::ensure_loaded`], which takes
//! the load lock only until the library is up and is a relaxed flag check
//! afterwards.

pub mod backend;
pub mod functions;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::native::exports;
use crate::platform::{self, Platform};

use self::backend::{LoaderBackend, LoadedModule, SystemLoader};
use self::functions::FunctionTable;

/// Default base name of the 32-bit native artifact.
pub const DEFAULT_LIBRARY_NAME_32: &str = "assimp32";

/// Default base name of the 64-bit native artifact.
pub const DEFAULT_LIBRARY_NAME_64: &str = "assimp64";

/// Lifecycle notifications observable via [`NativeLibrary::on_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryEvent {
    /// The library was opened and its export table resolved.
    Loaded,
    /// The library is about to be freed. Fired while the export table is
    /// still valid so collaborators (the log-stream registry in particular)
    /// can unregister native callbacks before the handle goes away.
    Freed,
}

type EventHandler = Box<dyn Fn(LibraryEvent) + Send + Sync>;

/// One load session: the open OS handle plus everything resolved from it.
/// Callers that are mid-call hold an `Arc` to the session, so the handle is
/// physically closed only after the last in-flight call finishes even if
/// the manager has already transitioned to unloaded.
pub(crate) struct LoadSession {
    path: PathBuf,
    functions: FunctionTable,
    _module: Box<dyn LoadedModule>,
}

impl LoadSession {
    pub(crate) fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}

/// Manages dynamic loading of the native library and access to its exports.
pub struct NativeLibrary {
    backend: Box<dyn LoaderBackend>,
    exports: &'static [&'static str],
    base_name_32: String,
    base_name_64: String,
    session: RwLock<Option<Arc<LoadSession>>>,
    load_lock: Mutex<()>,
    needs_load: AtomicBool,
    handlers: RwLock<Vec<EventHandler>>,
}

impl NativeLibrary {
    /// Construct a manager over an arbitrary loader backend. Production
    /// code uses [`NativeLibrary::instance`]; tests inject fakes here.
    pub fn new(
        backend: Box<dyn LoaderBackend>,
        exports: &'static [&'static str],
        base_name_32: impl Into<String>,
        base_name_64: impl Into<String>,
    ) -> Self {
        NativeLibrary {
            backend,
            exports,
            base_name_32: base_name_32.into(),
            base_name_64: base_name_64.into(),
            session: RwLock::new(None),
            load_lock: Mutex::new(()),
            needs_load: AtomicBool::new(true),
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide manager used by the importer facade and the
    /// log-stream registry.
    pub fn instance() -> &'static NativeLibrary {
        static INSTANCE: Lazy<NativeLibrary> = Lazy::new(|| {
            NativeLibrary::new(
                Box::new(SystemLoader),
                exports::REQUIRED,
                DEFAULT_LIBRARY_NAME_32,
                DEFAULT_LIBRARY_NAME_64,
            )
        });
        &INSTANCE
    }

    /// Whether a library is currently loaded.
    pub fn is_loaded(&self) -> bool {
        self.session.read().is_some()
    }

    /// Path of the currently loaded library, if any.
    pub fn library_path(&self) -> Option<PathBuf> {
        self.session.read().as_ref().map(|s| s.path.clone())
    }

    /// Default library path for this process: the platform-decorated base
    /// name (chosen by pointer width) next to the running executable.
    pub fn default_library_path(&self) -> Result<PathBuf> {
        let platform = Platform::current()?;
        let base_name = if platform::is_64_bit() {
            &self.base_name_64
        } else {
            &self.base_name_32
        };
        Ok(platform::app_base_directory().join(platform.decorate_library_name(base_name)))
    }

    /// Load the native library from the default path.
    pub fn load_default(&self) -> Result<bool> {
        let path = self.default_library_path()?;
        self.load(path)
    }

    /// Load the native library from `path`, appending the platform's
    /// library extension when the path has none.
    ///
    /// Loading while already loaded is an idempotent success: the existing
    /// handle, path and function table are kept untouched.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<bool> {
        let _guard = self.load_lock.lock();
        self.load_locked(path.as_ref())
    }

    fn load_locked(&self, path: &Path) -> Result<bool> {
        if self.is_loaded() {
            // Repeated loads are expected from concurrent lazy-load callers.
            tracing::debug!(path = %path.display(), "load requested while already loaded; ignoring");
            return Ok(true);
        }

        let path = self.path_with_extension(path)?;
        let module = self.backend.open(&path)?;
        let functions = FunctionTable::resolve(module.as_ref(), self.exports);
        tracing::info!(
            path = %path.display(),
            resolved = functions.len(),
            "native library loaded"
        );

        *self.session.write() = Some(Arc::new(LoadSession {
            path,
            functions,
            _module: module,
        }));
        self.emit(LibraryEvent::Loaded);
        Ok(true)
    }

    /// Free the currently loaded library. Returns `false` when nothing was
    /// loaded.
    ///
    /// [`LibraryEvent::Freed`] fires synchronously before the handle is
    /// released; once every in-flight caller drops its session the OS
    /// handle closes, and the manager re-arms lazy loading for the next
    /// native call.
    pub fn free(&self) -> bool {
        let _guard = self.load_lock.lock();
        if !self.is_loaded() {
            return false;
        }

        // Listeners detach through the still-resolved exports during this
        // notification.
        self.emit(LibraryEvent::Freed);

        let session = self.session.write().take();
        self.needs_load.store(true, Ordering::Release);
        drop(session);
        tracing::info!("native library freed");
        true
    }

    /// Look up a resolved export as a typed function pointer. `None` when
    /// the library is not loaded or the export was not resolved.
    ///
    /// # Safety
    ///
    /// `F` must match the export's C signature. The returned pointer is
    /// valid only while the library stays loaded; callers that must survive
    /// a concurrent `free` go through the session snapshot instead.
    pub unsafe fn function<F: Copy>(&self, name: &str) -> Option<F> {
        let session = self.session.read().clone()?;
        session.functions.get(name)
    }

    /// Load from the default path unless a library is already up.
    ///
    /// Cheap after the first call: an unsynchronized flag read is the whole
    /// hot path, so concurrent importer instances do not serialize on the
    /// load lock once the library is loaded.
    pub fn ensure_loaded(&self) -> Result<()> {
        if !self.needs_load.load(Ordering::Relaxed) {
            return Ok(());
        }

        let _guard = self.load_lock.lock();
        if !self.is_loaded() {
            let path = self.default_library_path()?;
            self.load_locked(&path)?;
        }
        // Cleared only after a successful load so a failed lazy load is
        // retried by the next caller.
        self.needs_load.store(false, Ordering::Release);
        Ok(())
    }

    /// Register a lifecycle notification handler.
    ///
    /// Handlers run synchronously on the loading/freeing thread and must
    /// not call back into `load`/`free`.
    pub fn on_event(&self, handler: impl Fn(LibraryEvent) + Send + Sync + 'static) {
        self.handlers.write().push(Box::new(handler));
    }

    /// Current load session, held by callers for the duration of a native
    /// call so the handle cannot close mid-call.
    pub(crate) fn session(&self) -> Option<Arc<LoadSession>> {
        self.session.read().clone()
    }

    fn path_with_extension(&self, path: &Path) -> Result<PathBuf> {
        if path.extension().is_some() {
            return Ok(path.to_path_buf());
        }
        let platform = Platform::current()?;
        let mut path = path.to_path_buf();
        path.set_extension(platform.library_extension());
        Ok(path)
    }

    fn emit(&self, event: LibraryEvent) {
        let handlers = self.handlers.read();
        for handler in handlers.iter() {
            handler(event);
        }
    }
}
