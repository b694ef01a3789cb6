//! Import/export facade.
//!
//! [`Importer`] is the client-facing entry point: it lazily loads the
//! native library on first use, applies per-importer property
//! configuration, optionally scope-attaches a log stream around each
//! operation and hands back opaque [`Scene`] handles. Instances are cheap;
//! concurrent imports use one importer per thread.

use std::path::Path;
use std::ptr::NonNull;
use std::sync::Arc;

use bitflags::bitflags;
use serde::Serialize;

use crate::config::{ImporterConfig, PropertyValue};
use crate::error::{Error, Result};
use crate::logging::LogStream;
use crate::native::api::{NativeApi, PropertyStore};
use crate::native::{AiExportDataBlob, AiScene};

bitflags! {
    /// Post-processing steps applied by the native importer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PostProcess: u32 {
        const CALC_TANGENT_SPACE = 0x1;
        const JOIN_IDENTICAL_VERTICES = 0x2;
        const MAKE_LEFT_HANDED = 0x4;
        const TRIANGULATE = 0x8;
        const REMOVE_COMPONENT = 0x10;
        const GEN_NORMALS = 0x20;
        const GEN_SMOOTH_NORMALS = 0x40;
        const SPLIT_LARGE_MESHES = 0x80;
        const PRE_TRANSFORM_VERTICES = 0x100;
        const LIMIT_BONE_WEIGHTS = 0x200;
        const VALIDATE_DATA_STRUCTURE = 0x400;
        const IMPROVE_CACHE_LOCALITY = 0x800;
        const REMOVE_REDUNDANT_MATERIALS = 0x1000;
        const FIX_INFACING_NORMALS = 0x2000;
        const SORT_BY_PRIMITIVE_TYPE = 0x8000;
        const FIND_DEGENERATES = 0x10000;
        const FIND_INVALID_DATA = 0x20000;
        const GEN_UV_COORDS = 0x40000;
        const TRANSFORM_UV_COORDS = 0x80000;
        const FIND_INSTANCES = 0x100000;
        const OPTIMIZE_MESHES = 0x200000;
        const OPTIMIZE_GRAPH = 0x400000;
        const FLIP_UVS = 0x800000;
        const FLIP_WINDING_ORDER = 0x1000000;
        const SPLIT_BY_BONE_COUNT = 0x2000000;
        const DEBONE = 0x4000000;
        const GLOBAL_SCALE = 0x8000000;
        const EMBED_TEXTURES = 0x10000000;
        const FORCE_GEN_NORMALS = 0x20000000;
        const DROP_NORMALS = 0x40000000;
        const GEN_BOUNDING_BOXES = 0x80000000;
    }
}

impl Default for PostProcess {
    fn default() -> Self {
        PostProcess::empty()
    }
}

impl PostProcess {
    /// A common preset for realtime rendering pipelines.
    pub fn target_realtime_quality() -> Self {
        PostProcess::CALC_TANGENT_SPACE
            | PostProcess::GEN_SMOOTH_NORMALS
            | PostProcess::JOIN_IDENTICAL_VERTICES
            | PostProcess::IMPROVE_CACHE_LOCALITY
            | PostProcess::LIMIT_BONE_WEIGHTS
            | PostProcess::REMOVE_REDUNDANT_MATERIALS
            | PostProcess::SPLIT_LARGE_MESHES
            | PostProcess::TRIANGULATE
            | PostProcess::GEN_UV_COORDS
            | PostProcess::SORT_BY_PRIMITIVE_TYPE
            | PostProcess::FIND_DEGENERATES
            | PostProcess::FIND_INVALID_DATA
    }
}

/// An imported scene. Opaque: the geometry lives on the native side and is
/// released when the handle drops.
pub struct Scene {
    scene: NonNull<AiScene>,
}

// SAFETY: the native scene is immutable after import; the handle only
// reads the pointer and releases it once, on drop.
unsafe impl Send for Scene {}
unsafe impl Sync for Scene {}

impl Scene {
    pub(crate) fn from_raw(scene: *const AiScene) -> Option<Scene> {
        NonNull::new(scene as *mut AiScene).map(|scene| Scene { scene })
    }

    /// Raw pointer for hand-written native calls.
    pub fn as_ptr(&self) -> *const AiScene {
        self.scene.as_ptr()
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        NativeApi::instance().release_import(self.scene.as_ptr());
    }
}

/// One export format supported by the loaded library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFormat {
    /// Identifier passed to the export operations.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Preferred file extension, without leading dot.
    pub file_extension: String,
}

/// In-memory export result: the native blob chain copied into owned
/// buffers. `next` carries auxiliary outputs such as material libraries.
#[derive(Debug, Default)]
pub struct ExportBlob {
    /// Blob name within the chain; empty for the primary output.
    pub name: String,
    /// Exported bytes.
    pub data: Vec<u8>,
    /// Next blob in the chain.
    pub next: Option<Box<ExportBlob>>,
}

impl ExportBlob {
    pub(crate) unsafe fn copy_from(blob: *const AiExportDataBlob) -> Option<Box<ExportBlob>> {
        if blob.is_null() {
            return None;
        }
        let size = (*blob).size;
        let mut data = vec![0u8; size];
        if size > 0 && !(*blob).data.is_null() {
            std::ptr::copy_nonoverlapping((*blob).data as *const u8, data.as_mut_ptr(), size);
        }
        Some(Box::new(ExportBlob {
            name: (*blob).name.to_string_lossy(),
            data,
            next: ExportBlob::copy_from((*blob).next),
        }))
    }

    /// Number of blobs in this chain, including `self`.
    pub fn chain_len(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |next| next.chain_len())
    }
}

/// Imports, exports and converts scenes through the native library.
#[derive(Default)]
pub struct Importer {
    config: ImporterConfig,
    post_process: PostProcess,
    log_stream: Option<Arc<LogStream>>,
}

impl Importer {
    pub fn new() -> Self {
        Importer::default()
    }

    /// Property configuration applied to every import.
    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ImporterConfig {
        &mut self.config
    }

    /// Post-processing steps applied by [`Importer::import_file`] and
    /// [`Importer::import_from_memory`].
    pub fn post_process(&self) -> PostProcess {
        self.post_process
    }

    pub fn set_post_process(&mut self, flags: PostProcess) -> &mut Self {
        self.post_process = flags;
        self
    }

    /// Attach `stream` around every subsequent operation, so native log
    /// output for this importer's calls reaches it.
    pub fn set_log_stream(&mut self, stream: Arc<LogStream>) -> &mut Self {
        self.log_stream = Some(stream);
        self
    }

    pub fn clear_log_stream(&mut self) -> &mut Self {
        self.log_stream = None;
        self
    }

    /// Import a scene from a file with the importer's post-process flags.
    pub fn import_file(&self, path: impl AsRef<Path>) -> Result<Scene> {
        self.import_file_with(path, self.post_process)
    }

    /// Import a scene from a file with explicit post-process flags.
    pub fn import_file_with(&self, path: impl AsRef<Path>, flags: PostProcess) -> Result<Scene> {
        let path = path_str(path.as_ref())?.to_string();
        self.with_logging(|| {
            let props = self.property_store()?;
            let scene =
                NativeApi::instance().import_file(&path, flags.bits(), props.as_ref())?;
            Scene::from_raw(scene)
                .ok_or_else(|| Error::ImportFailed(NativeApi::instance().error_string()))
        })
    }

    /// Import a scene from an in-memory buffer. `hint` names the format's
    /// usual extension (e.g. `"obj"`) for the native format dispatcher.
    pub fn import_from_memory(&self, buffer: &[u8], hint: &str) -> Result<Scene> {
        self.import_from_memory_with(buffer, hint, self.post_process)
    }

    /// Import from memory with explicit post-process flags.
    pub fn import_from_memory_with(
        &self,
        buffer: &[u8],
        hint: &str,
        flags: PostProcess,
    ) -> Result<Scene> {
        self.with_logging(|| {
            let props = self.property_store()?;
            let scene = NativeApi::instance().import_from_memory(
                buffer,
                flags.bits(),
                hint,
                props.as_ref(),
            )?;
            Scene::from_raw(scene)
                .ok_or_else(|| Error::ImportFailed(NativeApi::instance().error_string()))
        })
    }

    /// Export a scene to a file in the given format.
    pub fn export_file(
        &self,
        scene: &Scene,
        format_id: &str,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        self.export_file_with(scene, format_id, path, PostProcess::empty())
    }

    /// Export a scene to a file, running extra preprocessing steps first.
    pub fn export_file_with(
        &self,
        scene: &Scene,
        format_id: &str,
        path: impl AsRef<Path>,
        preprocessing: PostProcess,
    ) -> Result<()> {
        let path = path_str(path.as_ref())?.to_string();
        self.with_logging(|| {
            NativeApi::instance().export_scene(
                scene.as_ptr(),
                format_id,
                &path,
                preprocessing.bits(),
            )
        })
    }

    /// Export a scene to an in-memory blob chain.
    pub fn export_to_blob(&self, scene: &Scene, format_id: &str) -> Result<ExportBlob> {
        self.export_to_blob_with(scene, format_id, PostProcess::empty())
    }

    /// Export to a blob chain, running extra preprocessing steps first.
    pub fn export_to_blob_with(
        &self,
        scene: &Scene,
        format_id: &str,
        preprocessing: PostProcess,
    ) -> Result<ExportBlob> {
        self.with_logging(|| {
            let api = NativeApi::instance();
            let raw = api.export_scene_to_blob(scene.as_ptr(), format_id, preprocessing.bits())?;
            let blob = unsafe { ExportBlob::copy_from(raw) };
            api.release_export_blob(raw);
            blob.map(|blob| *blob)
                .ok_or_else(|| Error::ExportFailed(api.error_string()))
        })
    }

    /// Import `input` and export it to `output` in the given format.
    pub fn convert_file_to_file(
        &self,
        input: impl AsRef<Path>,
        format_id: &str,
        output: impl AsRef<Path>,
    ) -> Result<()> {
        let scene = self.import_file(input)?;
        self.export_file(&scene, format_id, output)
    }

    /// Import `input` and export it to an in-memory blob chain.
    pub fn convert_file_to_blob(
        &self,
        input: impl AsRef<Path>,
        format_id: &str,
    ) -> Result<ExportBlob> {
        let scene = self.import_file(input)?;
        self.export_to_blob(&scene, format_id)
    }

    /// Run additional post-processing over an already imported scene.
    ///
    /// On failure the native side has already destroyed the scene, so the
    /// handle is consumed either way.
    pub fn apply_post_processing(&self, scene: Scene, flags: PostProcess) -> Result<Scene> {
        let result = self.with_logging(|| {
            NativeApi::instance().apply_post_processing(scene.as_ptr(), flags.bits())
        });
        match result {
            // The native call returns the input scene on success; keep the
            // existing handle.
            Ok(_) => Ok(scene),
            Err(error) => {
                std::mem::forget(scene);
                Err(error)
            }
        }
    }

    /// Export formats supported by the loaded library.
    pub fn export_formats(&self) -> Result<Vec<ExportFormat>> {
        let api = NativeApi::instance();
        let count = api.export_format_count()?;
        let mut formats = Vec::with_capacity(count);
        for index in 0..count {
            if let Some((id, description, file_extension)) = api.export_format_description(index)? {
                formats.push(ExportFormat {
                    id,
                    description,
                    file_extension,
                });
            }
        }
        Ok(formats)
    }

    /// Whether files with `extension` can be imported. Accepts the
    /// extension with or without its leading dot.
    pub fn is_extension_supported(&self, extension: &str) -> Result<bool> {
        let dotted;
        let extension = if extension.starts_with('.') {
            extension
        } else {
            dotted = format!(".{extension}");
            &dotted
        };
        NativeApi::instance().is_extension_supported(extension)
    }

    /// Importable file extensions, without dots.
    pub fn supported_extensions(&self) -> Result<Vec<String>> {
        NativeApi::instance().extension_list()
    }

    fn with_logging<T>(&self, op: impl FnOnce() -> Result<T>) -> Result<T> {
        let attached = self
            .log_stream
            .as_ref()
            .map(|stream| stream.attach())
            .unwrap_or(false);
        let result = op();
        if attached {
            if let Some(stream) = &self.log_stream {
                stream.detach();
            }
        }
        result
    }

    fn property_store(&self) -> Result<Option<PropertyStore>> {
        if self.config.is_empty() {
            return Ok(None);
        }
        let store = NativeApi::instance().create_property_store()?;
        for (name, value) in self.config.iter() {
            match value {
                PropertyValue::Int(value) => store.set_integer(name, *value)?,
                PropertyValue::Bool(value) => store.set_integer(name, *value as i32)?,
                PropertyValue::Float(value) => store.set_float(name, *value)?,
                PropertyValue::Str(value) => store.set_string(name, value)?,
            }
        }
        Ok(Some(store))
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::InvalidArgument(format!("path is not valid UTF-8: {path:?}")))
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use super::*;
    use crate::native::AiString;

    #[test]
    fn test_blob_chain_copy() {
        let mut payload = *b"v 0 0 0\n";
        let mut material = AiExportDataBlob {
            size: 0,
            data: ptr::null_mut(),
            name: AiString::from_str("mtl"),
            next: ptr::null_mut(),
        };
        let main = AiExportDataBlob {
            size: payload.len(),
            data: payload.as_mut_ptr() as *mut _,
            name: AiString::new(),
            next: &mut material,
        };

        let blob = unsafe { ExportBlob::copy_from(&main) }.unwrap();
        assert_eq!(blob.chain_len(), 2);
        assert_eq!(blob.name, "");
        assert_eq!(blob.data, b"v 0 0 0\n");

        let next = blob.next.as_ref().unwrap();
        assert_eq!(next.name, "mtl");
        assert!(next.data.is_empty());
    }

    #[test]
    fn test_post_process_preset_is_stable() {
        let preset = PostProcess::target_realtime_quality();
        assert!(preset.contains(PostProcess::TRIANGULATE));
        assert!(preset.contains(PostProcess::GEN_SMOOTH_NORMALS));
        assert!(!preset.contains(PostProcess::FLIP_UVS));
    }

    #[test]
    fn test_importer_configuration_roundtrip() {
        let mut importer = Importer::new();
        importer
            .set_post_process(PostProcess::TRIANGULATE | PostProcess::FLIP_UVS)
            .config_mut()
            .set(crate::config::keys::PP_SLM_VERTEX_LIMIT, 65_000);

        assert!(importer.post_process().contains(PostProcess::TRIANGULATE));
        assert_eq!(importer.config().len(), 1);
    }
}
