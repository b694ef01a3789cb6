//! Typed entry points over the resolved export table.
//!
//! [`NativeApi`] is the single place that actually calls into the native
//! library. Every call resolves its export through the current load
//! session and holds that session for the duration, so a concurrent
//! `free()` can never close the OS handle under a call in flight.

use std::ffi::{CStr, CString};
use std::fmt;
use std::os::raw::{c_char, c_int, c_uint};
use std::ptr;
use std::sync::Arc;

use bitflags::bitflags;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::library::{LoadSession, NativeLibrary};
use crate::native::exports;
use crate::native::{
    AiExportDataBlob, AiLogStream, AiPropertyStore, AiReturn, AiScene,
    AiString, ApplyPostProcessingFn, AttachLogStreamFn, CreatePropertyStoreFn,
    DetachLogStreamFn, EnableVerboseLoggingFn, ExportFormatCountFn, ExportFormatDescriptionFn,
    ExportSceneFn, ExportSceneToBlobFn, GetCompileFlagsFn, GetErrorStringFn,
    GetExtensionListFn, GetStringFn, GetVersionComponentFn, ImportFileFn,
    ImportFileFromMemoryFn, IsExtensionSupportedFn, ReleaseExportBlobFn,
    ReleaseExportFormatDescriptionFn, ReleaseImportFn, ReleasePropertyStoreFn,
    SetPropertyFloatFn, SetPropertyIntegerFn, SetPropertyStringFn,
};

/// Version triple reported by the loaded library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

impl fmt::Display for LibraryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

bitflags! {
    /// Build configuration of the loaded native library.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CompileFlags: u32 {
        /// Built as a shared object.
        const SHARED = 0x1;
        /// Built against STLport.
        const STLPORT = 0x2;
        /// Debug build.
        const DEBUG = 0x4;
        /// Built without Boost.
        const NO_BOOST = 0x8;
        /// Built single-threaded.
        const SINGLE_THREADED = 0x10;
    }
}

/// A resolved export pinned to its load session for the duration of a call.
struct Entry<F> {
    _session: Arc<LoadSession>,
    func: F,
}

/// Typed access to the native library's exports.
pub struct NativeApi {
    library: &'static NativeLibrary,
}

impl NativeApi {
    /// The process-wide API instance over [`NativeLibrary::instance`].
    pub fn instance() -> &'static NativeApi {
        static API: Lazy<NativeApi> = Lazy::new(|| NativeApi {
            library: NativeLibrary::instance(),
        });
        &API
    }

    /// The underlying library manager.
    pub fn library(&self) -> &'static NativeLibrary {
        self.library
    }

    fn entry<F: Copy>(&self, name: &'static str) -> Result<Entry<F>> {
        self.library.ensure_loaded()?;
        self.resolved(name)
    }

    // Lookup without triggering a lazy load; used on teardown paths where
    // an unloaded library makes the call a no-op.
    fn resolved<F: Copy>(&self, name: &'static str) -> Result<Entry<F>> {
        let session = self
            .library
            .session()
            .ok_or(Error::FunctionNotAvailable(name))?;
        let func = unsafe { session.functions().get::<F>(name) }
            .ok_or(Error::FunctionNotAvailable(name))?;
        Ok(Entry {
            _session: session,
            func,
        })
    }

    /// Import a scene from a file path. Null results carry the native error
    /// string.
    pub fn import_file(
        &self,
        file: &str,
        flags: u32,
        props: Option<&PropertyStore>,
    ) -> Result<*const AiScene> {
        let entry = self.entry::<ImportFileFn>(exports::IMPORT_FILE)?;
        let file = cstring(file)?;
        let props = props.map_or(ptr::null(), PropertyStore::as_ptr);
        let scene =
            unsafe { (entry.func)(file.as_ptr(), flags as c_uint, ptr::null_mut(), props) };
        if scene.is_null() {
            return Err(Error::ImportFailed(self.error_string()));
        }
        Ok(scene)
    }

    /// Import a scene from an in-memory buffer. `hint` is the extension of
    /// the originating format, used by the native format dispatcher.
    pub fn import_from_memory(
        &self,
        buffer: &[u8],
        flags: u32,
        hint: &str,
        props: Option<&PropertyStore>,
    ) -> Result<*const AiScene> {
        let entry = self.entry::<ImportFileFromMemoryFn>(exports::IMPORT_FILE_FROM_MEMORY)?;
        let hint = cstring(hint)?;
        let props = props.map_or(ptr::null(), PropertyStore::as_ptr);
        let scene = unsafe {
            (entry.func)(
                buffer.as_ptr() as *const c_char,
                buffer.len() as c_uint,
                flags as c_uint,
                hint.as_ptr(),
                props,
            )
        };
        if scene.is_null() {
            return Err(Error::ImportFailed(self.error_string()));
        }
        Ok(scene)
    }

    /// Release an imported scene. A no-op when the library is already gone.
    pub fn release_import(&self, scene: *const AiScene) {
        if scene.is_null() {
            return;
        }
        if let Ok(entry) = self.resolved::<ReleaseImportFn>(exports::RELEASE_IMPORT) {
            unsafe { (entry.func)(scene) };
        }
    }

    /// Run additional post-processing steps over an imported scene. On
    /// failure the native side destroys the scene and returns null.
    pub fn apply_post_processing(
        &self,
        scene: *const AiScene,
        flags: u32,
    ) -> Result<*const AiScene> {
        let entry = self.entry::<ApplyPostProcessingFn>(exports::APPLY_POST_PROCESSING)?;
        let processed = unsafe { (entry.func)(scene, flags as c_uint) };
        if processed.is_null() {
            return Err(Error::ImportFailed(self.error_string()));
        }
        Ok(processed)
    }

    /// Export a scene to a file in the given format.
    pub fn export_scene(
        &self,
        scene: *const AiScene,
        format_id: &str,
        file: &str,
        preprocessing: u32,
    ) -> Result<()> {
        let entry = self.entry::<ExportSceneFn>(exports::EXPORT_SCENE)?;
        let format_id = cstring(format_id)?;
        let file = cstring(file)?;
        let status = unsafe {
            (entry.func)(
                scene,
                format_id.as_ptr(),
                file.as_ptr(),
                preprocessing as c_uint,
            )
        };
        match status {
            AiReturn::Success => Ok(()),
            _ => Err(Error::ExportFailed(self.error_string())),
        }
    }

    /// Export a scene to an in-memory blob chain. The caller copies and
    /// then releases the chain via [`NativeApi::release_export_blob`].
    pub fn export_scene_to_blob(
        &self,
        scene: *const AiScene,
        format_id: &str,
        preprocessing: u32,
    ) -> Result<*const AiExportDataBlob> {
        let entry = self.entry::<ExportSceneToBlobFn>(exports::EXPORT_SCENE_TO_BLOB)?;
        let format_id = cstring(format_id)?;
        let blob = unsafe { (entry.func)(scene, format_id.as_ptr(), preprocessing as c_uint) };
        if blob.is_null() {
            return Err(Error::ExportFailed(self.error_string()));
        }
        Ok(blob)
    }

    /// Release a native export blob chain.
    pub fn release_export_blob(&self, blob: *const AiExportDataBlob) {
        if blob.is_null() {
            return;
        }
        if let Ok(entry) = self.resolved::<ReleaseExportBlobFn>(exports::RELEASE_EXPORT_BLOB) {
            unsafe { (entry.func)(blob) };
        }
    }

    /// Number of export formats the library supports.
    pub fn export_format_count(&self) -> Result<usize> {
        let entry = self.entry::<ExportFormatCountFn>(exports::EXPORT_FORMAT_COUNT)?;
        Ok(unsafe { (entry.func)() })
    }

    /// Export format description by index, as owned strings.
    pub fn export_format_description(
        &self,
        index: usize,
    ) -> Result<Option<(String, String, String)>> {
        let entry =
            self.entry::<ExportFormatDescriptionFn>(exports::EXPORT_FORMAT_DESCRIPTION)?;
        let desc = unsafe { (entry.func)(index) };
        if desc.is_null() {
            return Ok(None);
        }
        let copied = unsafe {
            (
                string_from_ptr((*desc).id),
                string_from_ptr((*desc).description),
                string_from_ptr((*desc).file_extension),
            )
        };
        if let Ok(release) = self
            .resolved::<ReleaseExportFormatDescriptionFn>(exports::RELEASE_EXPORT_FORMAT_DESCRIPTION)
        {
            unsafe { (release.func)(desc) };
        }
        Ok(Some(copied))
    }

    /// Register the shared log-stream record with the native logger.
    pub fn attach_log_stream(&self, stream: *const AiLogStream) -> Result<()> {
        let entry = self.entry::<AttachLogStreamFn>(exports::ATTACH_LOG_STREAM)?;
        unsafe { (entry.func)(stream) };
        Ok(())
    }

    /// Unregister the shared log-stream record. Deliberately does not
    /// trigger a lazy load: detaching from an unloaded library is a no-op,
    /// and this runs inside the manager's free notification.
    pub fn detach_log_stream(&self, stream: *const AiLogStream) {
        if let Ok(entry) = self.resolved::<DetachLogStreamFn>(exports::DETACH_LOG_STREAM) {
            unsafe { (entry.func)(stream) };
        }
    }

    /// Toggle verbose native logging.
    pub fn enable_verbose_logging(&self, enabled: bool) -> Result<()> {
        let entry = self.entry::<EnableVerboseLoggingFn>(exports::ENABLE_VERBOSE_LOGGING)?;
        unsafe { (entry.func)(enabled as c_int) };
        Ok(())
    }

    /// Error text of the calling thread's most recent failed native call.
    /// Empty when the library or the export is unavailable.
    pub fn error_string(&self) -> String {
        match self.resolved::<GetErrorStringFn>(exports::GET_ERROR_STRING) {
            Ok(entry) => unsafe { string_from_ptr((entry.func)()) },
            Err(_) => String::new(),
        }
    }

    /// Version of the loaded library.
    pub fn version(&self) -> Result<LibraryVersion> {
        let major = self.entry::<GetVersionComponentFn>(exports::GET_VERSION_MAJOR)?;
        let minor = self.entry::<GetVersionComponentFn>(exports::GET_VERSION_MINOR)?;
        let revision = self.entry::<GetVersionComponentFn>(exports::GET_VERSION_REVISION)?;
        Ok(LibraryVersion {
            major: unsafe { (major.func)() },
            minor: unsafe { (minor.func)() },
            revision: unsafe { (revision.func)() },
        })
    }

    /// Build configuration flags of the loaded library.
    pub fn compile_flags(&self) -> Result<CompileFlags> {
        let entry = self.entry::<GetCompileFlagsFn>(exports::GET_COMPILE_FLAGS)?;
        Ok(CompileFlags::from_bits_retain(unsafe { (entry.func)() }))
    }

    /// Whether the loaded library may be called from several threads at
    /// once.
    pub fn is_multithreading_supported(&self) -> Result<bool> {
        let flags = self.compile_flags()?;
        Ok(!flags.intersects(CompileFlags::SINGLE_THREADED | CompileFlags::NO_BOOST))
    }

    /// License text embedded in the library.
    pub fn legal_string(&self) -> Result<String> {
        let entry = self.entry::<GetStringFn>(exports::GET_LEGAL_STRING)?;
        Ok(unsafe { string_from_ptr((entry.func)()) })
    }

    /// Source branch the library was built from.
    pub fn branch_name(&self) -> Result<String> {
        let entry = self.entry::<GetStringFn>(exports::GET_BRANCH_NAME)?;
        Ok(unsafe { string_from_ptr((entry.func)()) })
    }

    /// Whether a file extension (with leading dot) is importable.
    pub fn is_extension_supported(&self, extension: &str) -> Result<bool> {
        let entry = self.entry::<IsExtensionSupportedFn>(exports::IS_EXTENSION_SUPPORTED)?;
        let extension = cstring(extension)?;
        Ok(unsafe { (entry.func)(extension.as_ptr()) } != 0)
    }

    /// Importable file extensions, without the `*.` glob prefix.
    pub fn extension_list(&self) -> Result<Vec<String>> {
        let entry = self.entry::<GetExtensionListFn>(exports::GET_EXTENSION_LIST)?;
        let mut out = AiString::new();
        unsafe { (entry.func)(&mut out) };
        Ok(out
            .to_string_lossy()
            .split(';')
            .filter(|item| !item.is_empty())
            .map(|item| item.trim_start_matches("*.").to_string())
            .collect())
    }

    /// Create an import property store.
    pub fn create_property_store(&'static self) -> Result<PropertyStore> {
        let entry = self.entry::<CreatePropertyStoreFn>(exports::CREATE_PROPERTY_STORE)?;
        let store = unsafe { (entry.func)() };
        if store.is_null() {
            return Err(Error::ImportFailed(
                "native library failed to allocate a property store".into(),
            ));
        }
        Ok(PropertyStore { store, api: self })
    }
}

/// RAII handle over a native import property store.
pub struct PropertyStore {
    store: *mut AiPropertyStore,
    api: &'static NativeApi,
}

// SAFETY: the store pointer is only written through the setters below and
// the native setters take it by exclusive convention; moving the handle
// between threads is fine.
unsafe impl Send for PropertyStore {}

impl PropertyStore {
    pub(crate) fn as_ptr(&self) -> *const AiPropertyStore {
        self.store
    }

    /// Set an integer property.
    pub fn set_integer(&self, name: &str, value: i32) -> Result<()> {
        let entry = self
            .api
            .resolved::<SetPropertyIntegerFn>(exports::SET_PROPERTY_INTEGER)?;
        let name = cstring(name)?;
        unsafe { (entry.func)(self.store, name.as_ptr(), value as c_int) };
        Ok(())
    }

    /// Set a float property.
    pub fn set_float(&self, name: &str, value: f32) -> Result<()> {
        let entry = self
            .api
            .resolved::<SetPropertyFloatFn>(exports::SET_PROPERTY_FLOAT)?;
        let name = cstring(name)?;
        unsafe { (entry.func)(self.store, name.as_ptr(), value) };
        Ok(())
    }

    /// Set a string property.
    pub fn set_string(&self, name: &str, value: &str) -> Result<()> {
        let entry = self
            .api
            .resolved::<SetPropertyStringFn>(exports::SET_PROPERTY_STRING)?;
        let name = cstring(name)?;
        let value = AiString::from_str(value);
        unsafe { (entry.func)(self.store, name.as_ptr(), &value) };
        Ok(())
    }
}

impl Drop for PropertyStore {
    fn drop(&mut self) {
        if let Ok(entry) = self
            .api
            .resolved::<ReleasePropertyStoreFn>(exports::RELEASE_PROPERTY_STORE)
        {
            unsafe { (entry.func)(self.store) };
        }
    }
}

fn cstring(value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| Error::InvalidArgument(format!("string contains interior NUL: {value:?}")))
}

unsafe fn string_from_ptr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display() {
        let version = LibraryVersion {
            major: 5,
            minor: 3,
            revision: 1,
        };
        assert_eq!(version.to_string(), "5.3.1");
    }

    #[test]
    fn test_single_threaded_flag_bits() {
        let flags = CompileFlags::from_bits_retain(0x11);
        assert!(flags.contains(CompileFlags::SHARED));
        assert!(flags.contains(CompileFlags::SINGLE_THREADED));
        assert!(!flags.contains(CompileFlags::DEBUG));
    }
}
