//! The C ABI surface of the native library.
//!
//! `#[repr(C)]` mirrors of the structures crossing the boundary, plus the
//! `extern "C"` signatures of every export the binding resolves. Nothing in
//! here calls the library; [`api`] does.

pub mod api;
pub mod exports;

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};

/// Fixed capacity of the native string type.
pub const MAX_STRING_LENGTH: usize = 1024;

/// Native length-prefixed string with fixed storage.
#[repr(C)]
pub struct AiString {
    /// Length in bytes, excluding any terminator.
    pub length: u32,
    /// UTF-8 bytes; only the first `length` are meaningful.
    pub data: [c_char; MAX_STRING_LENGTH],
}

impl AiString {
    /// Empty native string, used as an out-parameter.
    pub fn new() -> Self {
        AiString {
            length: 0,
            data: [0; MAX_STRING_LENGTH],
        }
    }

    /// Build a native string from `text`, truncating at the fixed capacity
    /// minus a terminator byte.
    pub fn from_str(text: &str) -> Self {
        let mut string = AiString::new();
        let bytes = text.as_bytes();
        let length = bytes.len().min(MAX_STRING_LENGTH - 1);
        for (slot, &byte) in string.data.iter_mut().zip(&bytes[..length]) {
            *slot = byte as c_char;
        }
        string.length = length as u32;
        string
    }

    /// Copy the contents out as an owned `String`, replacing invalid UTF-8.
    pub fn to_string_lossy(&self) -> String {
        let length = (self.length as usize).min(MAX_STRING_LENGTH);
        let bytes: Vec<u8> = self.data[..length].iter().map(|&b| b as u8).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Default for AiString {
    fn default() -> Self {
        AiString::new()
    }
}

/// Return status of native calls that report one.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiReturn {
    /// Call succeeded.
    Success = 0,
    /// Call failed; the error string export may carry details.
    Failure = -1,
    /// The native allocator gave up.
    OutOfMemory = -3,
}

/// Callback signature the native logger invokes per message.
pub type AiLogStreamCallback = unsafe extern "C" fn(message: *const c_char, user: *mut c_char);

/// Log-stream registration record handed to the native library.
#[repr(C)]
pub struct AiLogStream {
    /// Message callback.
    pub callback: Option<AiLogStreamCallback>,
    /// Opaque user data echoed back on every message.
    pub user: *mut c_char,
}

/// One blob of exported data. `next` chains auxiliary blobs (e.g. material
/// files accompanying the main output).
#[repr(C)]
pub struct AiExportDataBlob {
    /// Size of `data` in bytes.
    pub size: usize,
    /// The exported bytes.
    pub data: *mut c_void,
    /// Name of this blob within the chain.
    pub name: AiString,
    /// Next blob, or null.
    pub next: *mut AiExportDataBlob,
}

/// Description of one export format supported by the native library.
#[repr(C)]
pub struct AiExportFormatDesc {
    /// Stable identifier passed to the export calls.
    pub id: *const c_char,
    /// Human-readable description.
    pub description: *const c_char,
    /// Preferred file extension, without leading dot.
    pub file_extension: *const c_char,
}

/// Opaque imported scene.
#[repr(C)]
pub struct AiScene {
    _private: [u8; 0],
}

/// Opaque property store holding import configuration.
#[repr(C)]
pub struct AiPropertyStore {
    _private: [u8; 0],
}

/// Opaque custom file-IO hook; the binding always passes null.
#[repr(C)]
pub struct AiFileIo {
    _private: [u8; 0],
}

// Typed signatures of the resolved exports.

pub type ImportFileFn = unsafe extern "C" fn(
    file: *const c_char,
    flags: c_uint,
    io: *mut AiFileIo,
    props: *const AiPropertyStore,
) -> *const AiScene;

pub type ImportFileFromMemoryFn = unsafe extern "C" fn(
    buffer: *const c_char,
    length: c_uint,
    flags: c_uint,
    hint: *const c_char,
    props: *const AiPropertyStore,
) -> *const AiScene;

pub type ReleaseImportFn = unsafe extern "C" fn(scene: *const AiScene);

pub type ApplyPostProcessingFn =
    unsafe extern "C" fn(scene: *const AiScene, flags: c_uint) -> *const AiScene;

pub type ExportSceneFn = unsafe extern "C" fn(
    scene: *const AiScene,
    format_id: *const c_char,
    file: *const c_char,
    preprocessing: c_uint,
) -> AiReturn;

pub type ExportSceneToBlobFn = unsafe extern "C" fn(
    scene: *const AiScene,
    format_id: *const c_char,
    preprocessing: c_uint,
) -> *const AiExportDataBlob;

pub type ReleaseExportBlobFn = unsafe extern "C" fn(blob: *const AiExportDataBlob);

pub type ExportFormatCountFn = unsafe extern "C" fn() -> usize;

pub type ExportFormatDescriptionFn =
    unsafe extern "C" fn(index: usize) -> *const AiExportFormatDesc;

pub type ReleaseExportFormatDescriptionFn =
    unsafe extern "C" fn(desc: *const AiExportFormatDesc);

pub type AttachLogStreamFn = unsafe extern "C" fn(stream: *const AiLogStream);

pub type DetachLogStreamFn = unsafe extern "C" fn(stream: *const AiLogStream) -> AiReturn;

pub type EnableVerboseLoggingFn = unsafe extern "C" fn(enable: c_int);

pub type GetErrorStringFn = unsafe extern "C" fn() -> *const c_char;

pub type GetVersionComponentFn = unsafe extern "C" fn() -> c_uint;

pub type GetCompileFlagsFn = unsafe extern "C" fn() -> c_uint;

pub type GetStringFn = unsafe extern "C" fn() -> *const c_char;

pub type IsExtensionSupportedFn = unsafe extern "C" fn(extension: *const c_char) -> c_int;

pub type GetExtensionListFn = unsafe extern "C" fn(out: *mut AiString);

pub type CreatePropertyStoreFn = unsafe extern "C" fn() -> *mut AiPropertyStore;

pub type ReleasePropertyStoreFn = unsafe extern "C" fn(store: *mut AiPropertyStore);

pub type SetPropertyIntegerFn =
    unsafe extern "C" fn(store: *mut AiPropertyStore, name: *const c_char, value: c_int);

pub type SetPropertyFloatFn =
    unsafe extern "C" fn(store: *mut AiPropertyStore, name: *const c_char, value: f32);

pub type SetPropertyStringFn =
    unsafe extern "C" fn(store: *mut AiPropertyStore, name: *const c_char, value: *const AiString);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_string_roundtrip() {
        let string = AiString::from_str("scene.obj");
        assert_eq!(string.length, 9);
        assert_eq!(string.to_string_lossy(), "scene.obj");
    }

    #[test]
    fn test_ai_string_truncates_at_capacity() {
        let long = "x".repeat(MAX_STRING_LENGTH * 2);
        let string = AiString::from_str(&long);
        assert_eq!(string.length as usize, MAX_STRING_LENGTH - 1);
    }

    #[test]
    fn test_empty_ai_string() {
        let string = AiString::new();
        assert_eq!(string.to_string_lossy(), "");
    }
}
