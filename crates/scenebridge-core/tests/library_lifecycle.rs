//! Lifecycle behavior of the library manager: idempotent loads, failure
//! recovery and teardown ordering.

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use scenebridge_core::library::backend::SystemLoader;
use scenebridge_core::library::{LibraryEvent, NativeLibrary};
use scenebridge_core::native::exports;
use scenebridge_core::Error;

use common::CountingLoader;

fn manager_with(loader: CountingLoader) -> NativeLibrary {
    NativeLibrary::new(Box::new(loader), exports::REQUIRED, "assimp32", "assimp64")
}

#[test]
fn test_repeated_load_is_idempotent() {
    let loader = CountingLoader::new();
    let opens = loader.opens.clone();
    let resolves = loader.resolves.clone();
    let library = manager_with(loader);

    assert!(library.load("/opt/native/assimp").unwrap());
    let path = library.library_path().unwrap();
    let resolved_once = resolves.load(Ordering::SeqCst);
    assert_eq!(resolved_once, exports::REQUIRED.len());

    // The second load must neither re-open nor re-resolve.
    assert!(library.load("/somewhere/else/assimp").unwrap());
    assert_eq!(library.library_path().unwrap(), path);
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(resolves.load(Ordering::SeqCst), resolved_once);
}

#[test]
fn test_load_failure_leaves_clean_state() {
    let loader = CountingLoader::failing_on("missing");
    let library = manager_with(loader);

    let error = library.load("/opt/native/missing-assimp").unwrap_err();
    assert!(matches!(error, Error::LoadFailed { .. }));
    assert!(!library.is_loaded());
    assert!(library.library_path().is_none());

    // A corrected retry succeeds on the same manager.
    assert!(library.load("/opt/native/assimp").unwrap());
    assert!(library.is_loaded());
}

#[test]
fn test_system_loader_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let library = NativeLibrary::new(
        Box::new(SystemLoader),
        exports::REQUIRED,
        "assimp32",
        "assimp64",
    );

    let error = library.load(dir.path().join("does-not-exist")).unwrap_err();
    match error {
        Error::LoadFailed { reason, .. } => assert!(!reason.is_empty()),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!library.is_loaded());
}

#[test]
fn test_freed_event_fires_before_handle_release() {
    let loader = CountingLoader::new();
    let closed = loader.closed.clone();
    let library = manager_with(loader);

    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    {
        let order = order.clone();
        let closed = closed.clone();
        library.on_event(move |event| {
            let step = match event {
                LibraryEvent::Loaded => "loaded",
                LibraryEvent::Freed => {
                    assert!(
                        !closed.load(Ordering::SeqCst),
                        "handle must still be open during the freed notification"
                    );
                    "freed"
                }
            };
            order.lock().unwrap().push(step);
        });
    }

    library.load("/opt/native/assimp").unwrap();
    assert!(library.free());
    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(*order.lock().unwrap(), vec!["loaded", "freed"]);
}

#[test]
fn test_function_lookup_degrades_to_none() {
    let loader = CountingLoader::new();
    let library = manager_with(loader);

    type AnyFn = unsafe extern "C" fn();

    // Not loaded yet: lookups return nothing rather than failing.
    assert!(unsafe { library.function::<AnyFn>(exports::IMPORT_FILE) }.is_none());

    library.load("/opt/native/assimp").unwrap();
    assert!(unsafe { library.function::<AnyFn>(exports::IMPORT_FILE) }.is_some());
    assert!(unsafe { library.function::<AnyFn>("aiNotARealExport") }.is_none());

    library.free();
    assert!(unsafe { library.function::<AnyFn>(exports::IMPORT_FILE) }.is_none());
}

#[test]
fn test_load_free_cycles_survive() {
    let loader = CountingLoader::new();
    let opens = loader.opens.clone();
    let library = manager_with(loader);

    for cycle in 1..=5 {
        assert!(library.load("/opt/native/assimp").unwrap());
        assert!(library.is_loaded());
        assert!(library.free());
        assert!(!library.is_loaded());
        assert_eq!(opens.load(Ordering::SeqCst), cycle);
    }
}

#[test]
fn test_concurrent_lazy_loads_open_once() {
    let loader = CountingLoader::new();
    let opens = loader.opens.clone();
    let library = manager_with(loader);

    std::thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                library.ensure_loaded().unwrap();
                assert!(library.is_loaded());
            });
        }
    });

    assert_eq!(opens.load(Ordering::SeqCst), 1);
}
