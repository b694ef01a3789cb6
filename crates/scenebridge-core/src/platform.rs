//! OS detection and shared-library naming conventions.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Supported operating-system families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Windows (`*.dll`, no prefix).
    Windows,
    /// Linux and other Unix (`lib*.so`).
    Unix,
    /// macOS (`lib*.dylib`).
    Mac,
}

impl Platform {
    /// Detect the platform this process is running on.
    pub fn current() -> Result<Platform> {
        if cfg!(windows) {
            Ok(Platform::Windows)
        } else if cfg!(target_os = "macos") {
            Ok(Platform::Mac)
        } else if cfg!(unix) {
            Ok(Platform::Unix)
        } else {
            Err(Error::UnsupportedPlatform)
        }
    }

    /// File-name prefix for shared libraries on this platform.
    pub fn library_prefix(self) -> &'static str {
        match self {
            Platform::Windows => "",
            Platform::Unix | Platform::Mac => "lib",
        }
    }

    /// File-name extension for shared libraries on this platform, without
    /// the leading dot.
    pub fn library_extension(self) -> &'static str {
        match self {
            Platform::Windows => "dll",
            Platform::Unix => "so",
            Platform::Mac => "dylib",
        }
    }

    /// Decorate a bare library name with this platform's prefix and
    /// extension, e.g. `assimp64` becomes `libassimp64.so` on Unix. A name
    /// that already carries an extension keeps it.
    pub fn decorate_library_name(self, base_name: &str) -> String {
        let mut name = PathBuf::from(format!("{}{}", self.library_prefix(), base_name));
        if name.extension().is_none() {
            name.set_extension(self.library_extension());
        }
        name.to_string_lossy().into_owned()
    }
}

/// Whether this process runs with 64-bit pointers. Selects between the
/// 32-bit and 64-bit native artifacts.
pub fn is_64_bit() -> bool {
    cfg!(target_pointer_width = "64")
}

/// Base directory of the running application; the default library path is
/// resolved relative to it. Falls back to the current directory when the
/// executable path cannot be queried.
pub fn app_base_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_platform_matches_cfg() {
        let platform = Platform::current().unwrap();

        #[cfg(windows)]
        assert_eq!(platform, Platform::Windows);

        #[cfg(target_os = "macos")]
        assert_eq!(platform, Platform::Mac);

        #[cfg(all(unix, not(target_os = "macos")))]
        assert_eq!(platform, Platform::Unix);
    }

    #[test]
    fn test_decorate_library_name() {
        assert_eq!(
            Platform::Windows.decorate_library_name("assimp64"),
            "assimp64.dll"
        );
        assert_eq!(
            Platform::Unix.decorate_library_name("assimp64"),
            "libassimp64.so"
        );
        assert_eq!(
            Platform::Mac.decorate_library_name("assimp64"),
            "libassimp64.dylib"
        );
    }

    #[test]
    fn test_decorate_keeps_existing_extension() {
        assert_eq!(
            Platform::Unix.decorate_library_name("assimp.so.5"),
            "libassimp.so.5"
        );
    }

    #[test]
    fn test_app_base_directory_is_not_empty() {
        let dir = app_base_directory();
        assert!(!dir.as_os_str().is_empty());
    }
}
