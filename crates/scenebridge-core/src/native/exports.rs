//! Names of the native exports the binding resolves.

/// Import a scene from a file path, with property overrides.
pub const IMPORT_FILE: &str = "aiImportFileExWithProperties";

/// Import a scene from an in-memory buffer, with property overrides.
pub const IMPORT_FILE_FROM_MEMORY: &str = "aiImportFileFromMemoryWithProperties";

/// Release an imported scene.
pub const RELEASE_IMPORT: &str = "aiReleaseImport";

/// Run additional post-processing over an imported scene.
pub const APPLY_POST_PROCESSING: &str = "aiApplyPostProcessing";

/// Export a scene to a file.
pub const EXPORT_SCENE: &str = "aiExportScene";

/// Export a scene to an in-memory blob chain.
pub const EXPORT_SCENE_TO_BLOB: &str = "aiExportSceneToBlob";

/// Release an export blob chain.
pub const RELEASE_EXPORT_BLOB: &str = "aiReleaseExportBlob";

/// Number of supported export formats.
pub const EXPORT_FORMAT_COUNT: &str = "aiGetExportFormatCount";

/// Description of one export format by index.
pub const EXPORT_FORMAT_DESCRIPTION: &str = "aiGetExportFormatDescription";

/// Release an export format description.
pub const RELEASE_EXPORT_FORMAT_DESCRIPTION: &str = "aiReleaseExportFormatDescription";

/// Register a log-stream callback record.
pub const ATTACH_LOG_STREAM: &str = "aiAttachLogStream";

/// Unregister a previously attached log-stream record.
pub const DETACH_LOG_STREAM: &str = "aiDetachLogStream";

/// Toggle verbose native logging.
pub const ENABLE_VERBOSE_LOGGING: &str = "aiEnableVerboseLogging";

/// Last error text of the calling thread's most recent failed call.
pub const GET_ERROR_STRING: &str = "aiGetErrorString";

/// Version components of the loaded library.
pub const GET_VERSION_MAJOR: &str = "aiGetVersionMajor";
pub const GET_VERSION_MINOR: &str = "aiGetVersionMinor";
pub const GET_VERSION_REVISION: &str = "aiGetVersionRevision";

/// Build configuration flags of the loaded library.
pub const GET_COMPILE_FLAGS: &str = "aiGetCompileFlags";

/// License text embedded in the library.
pub const GET_LEGAL_STRING: &str = "aiGetLegalString";

/// Source branch the library was built from.
pub const GET_BRANCH_NAME: &str = "aiGetBranchName";

/// Whether a file extension is importable.
pub const IS_EXTENSION_SUPPORTED: &str = "aiIsExtensionSupported";

/// Semicolon-separated list of importable extensions.
pub const GET_EXTENSION_LIST: &str = "aiGetExtensionList";

/// Create an import property store.
pub const CREATE_PROPERTY_STORE: &str = "aiCreatePropertyStore";

/// Release an import property store.
pub const RELEASE_PROPERTY_STORE: &str = "aiReleasePropertyStore";

/// Property setters.
pub const SET_PROPERTY_INTEGER: &str = "aiSetImportPropertyInteger";
pub const SET_PROPERTY_FLOAT: &str = "aiSetImportPropertyFloat";
pub const SET_PROPERTY_STRING: &str = "aiSetImportPropertyString";

/// The fixed export set resolved on every load.
pub const REQUIRED: &[&str] = &[
    IMPORT_FILE,
    IMPORT_FILE_FROM_MEMORY,
    RELEASE_IMPORT,
    APPLY_POST_PROCESSING,
    EXPORT_SCENE,
    EXPORT_SCENE_TO_BLOB,
    RELEASE_EXPORT_BLOB,
    EXPORT_FORMAT_COUNT,
    EXPORT_FORMAT_DESCRIPTION,
    RELEASE_EXPORT_FORMAT_DESCRIPTION,
    ATTACH_LOG_STREAM,
    DETACH_LOG_STREAM,
    ENABLE_VERBOSE_LOGGING,
    GET_ERROR_STRING,
    GET_VERSION_MAJOR,
    GET_VERSION_MINOR,
    GET_VERSION_REVISION,
    GET_COMPILE_FLAGS,
    GET_LEGAL_STRING,
    GET_BRANCH_NAME,
    IS_EXTENSION_SUPPORTED,
    GET_EXTENSION_LIST,
    CREATE_PROPERTY_STORE,
    RELEASE_PROPERTY_STORE,
    SET_PROPERTY_INTEGER,
    SET_PROPERTY_FLOAT,
    SET_PROPERTY_STRING,
];
