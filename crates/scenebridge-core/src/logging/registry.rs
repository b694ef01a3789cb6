//! Process-wide registry of attached log streams.
//!
//! All attached streams share one native callback registration, gated by a
//! reference count: the thunk is installed when the attached population
//! goes 0→1 and removed when it returns to 0. The enumerable view of
//! attached streams is a copy-on-write snapshot (`Arc<Vec<_>>` swapped
//! wholesale), so readers never observe a torn collection; delivery is
//! routed through a per-thread id set so messages reach only the streams
//! the dispatching thread attached.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::os::raw::c_char;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::Result;
use crate::library::{LibraryEvent, NativeLibrary};
use crate::native::api::NativeApi;
use crate::native::AiLogStream;

use super::LogStream;

/// Installs and removes the shared native callback registration. The
/// production host drives the native attach/detach exports; tests inject
/// counting fakes.
pub trait LogCallbackHost: Send + Sync {
    /// Register the shared callback with the native library.
    fn install(&self) -> Result<()>;

    /// Remove the shared callback registration. Must tolerate the library
    /// being unloaded already.
    fn remove(&self);
}

struct NativeLogHost;

impl LogCallbackHost for NativeLogHost {
    fn install(&self) -> Result<()> {
        NativeApi::instance().attach_log_stream(thunk_record())
    }

    fn remove(&self) {
        NativeApi::instance().detach_log_stream(thunk_record());
    }
}

// The single callback record handed to the native library. One per
// process; the registry fans messages out from it.
struct ThunkRecord(AiLogStream);

// SAFETY: the record is immutable after construction and the callback it
// carries is thread-safe.
unsafe impl Sync for ThunkRecord {}

static THUNK: ThunkRecord = ThunkRecord(AiLogStream {
    callback: Some(forward_native_message),
    user: ptr::null_mut(),
});

fn thunk_record() -> *const AiLogStream {
    &THUNK.0
}

unsafe extern "C" fn forward_native_message(message: *const c_char, _user: *mut c_char) {
    if message.is_null() {
        return;
    }
    let text = CStr::from_ptr(message).to_string_lossy();
    LogStreamRegistry::global().dispatch(&text);
}

#[derive(Clone)]
struct GlobalEntry {
    id: u64,
    stream: Weak<LogStream>,
}

thread_local! {
    // Stream ids attached by this thread, keyed per registry instance so
    // independent registries (tests) never cross-route.
    static THREAD_STREAMS: RefCell<HashMap<usize, HashSet<u64>>> = RefCell::new(HashMap::new());
}

pub(super) fn thread_holds(inner: &Arc<RegistryInner>, id: u64) -> bool {
    THREAD_STREAMS.with(|cell| {
        cell.borrow()
            .get(&registry_key(inner))
            .is_some_and(|set| set.contains(&id))
    })
}

fn registry_key(inner: &Arc<RegistryInner>) -> usize {
    Arc::as_ptr(inner) as usize
}

pub(super) struct RegistryInner {
    streams: RwLock<Arc<Vec<GlobalEntry>>>,
    thunk_refs: AtomicUsize,
    host: Box<dyn LogCallbackHost>,
}

impl RegistryInner {
    pub(super) fn attach(this: &Arc<Self>, stream: &LogStream) -> bool {
        if stream.is_disposed() {
            return false;
        }

        let id = stream.id();
        let accepted = THREAD_STREAMS.with(|cell| {
            let mut map = cell.borrow_mut();
            let set = map.entry(registry_key(this)).or_default();
            if set.contains(&id) {
                if stream.is_attached() {
                    // Already attached on this thread; rejected without
                    // touching the global count.
                    return false;
                }
                // Residue of a forced detach issued from another thread.
                set.remove(&id);
            }
            set.insert(id)
        });
        if !accepted {
            return false;
        }

        *stream.registry.lock() = Arc::downgrade(this);

        // The thunk reference is taken before the attachment count rises so
        // a concurrent forced detach can never rebalance a reference that
        // was not yet counted.
        if this.thunk_refs.fetch_add(1, Ordering::AcqRel) == 0 {
            if let Err(error) = this.host.install() {
                tracing::warn!(%error, "failed to register the native log callback");
            }
        }

        let previous = stream.attach_count.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            this.push_global(stream);
            stream.notify_attached();
        }
        true
    }

    pub(super) fn detach(this: &Arc<Self>, stream: &LogStream) -> bool {
        let id = stream.id();
        let held = THREAD_STREAMS.with(|cell| {
            cell.borrow_mut()
                .get_mut(&registry_key(this))
                .map(|set| set.remove(&id))
                .unwrap_or(false)
        });
        if !held {
            return false;
        }

        // This thread owned one attachment unit unless a forced detach
        // zeroed the count in the meantime.
        let mut count = stream.attach_count.load(Ordering::Acquire);
        loop {
            if count == 0 {
                return false;
            }
            match stream.attach_count.compare_exchange_weak(
                count,
                count - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => count = current,
            }
        }

        if count == 1 {
            this.remove_global(id);
            stream.notify_detached();
        }
        this.release_thunk_ref();
        true
    }

    /// Zero a stream's attachments regardless of which threads hold them.
    /// Per-thread routing entries left behind on other threads are purged
    /// lazily by their next dispatch or attach.
    pub(super) fn force_detach(this: &Arc<Self>, stream: &LogStream) -> bool {
        let count = stream.attach_count.swap(0, Ordering::AcqRel);
        // Unconditional removal also reaps an entry published by an attach
        // that raced this call.
        this.remove_global(stream.id());
        if count == 0 {
            return false;
        }
        stream.notify_detached();
        for _ in 0..count {
            this.release_thunk_ref();
        }
        true
    }

    pub(super) fn detach_all(this: &Arc<Self>) {
        let drained = {
            let mut guard = this.streams.write();
            std::mem::replace(&mut *guard, Arc::new(Vec::new()))
        };
        for entry in drained.iter() {
            if let Some(stream) = entry.stream.upgrade() {
                RegistryInner::force_detach(this, &stream);
            }
        }
    }

    pub(super) fn dispatch(this: &Arc<Self>, message: &str) {
        let snapshot = this.streams.read().clone();
        let key = registry_key(this);

        // Targets are collected first so sinks run outside the thread-set
        // borrow and may themselves attach or detach.
        let targets: Vec<Arc<LogStream>> = THREAD_STREAMS.with(|cell| {
            let mut map = cell.borrow_mut();
            let Some(set) = map.get_mut(&key) else {
                return Vec::new();
            };
            if set.is_empty() {
                return Vec::new();
            }
            let mut stale = Vec::new();
            let mut targets = Vec::new();
            for entry in snapshot.iter() {
                if !set.contains(&entry.id) {
                    continue;
                }
                match entry.stream.upgrade() {
                    Some(stream) if stream.is_attached() => targets.push(stream),
                    _ => stale.push(entry.id),
                }
            }
            for id in stale {
                set.remove(&id);
            }
            targets
        });

        for stream in targets {
            stream.receive(message);
        }
    }

    pub(super) fn attached_count(&self) -> usize {
        self.streams.read().len()
    }

    pub(super) fn attached_streams(&self) -> Vec<Arc<LogStream>> {
        self.streams
            .read()
            .iter()
            .filter_map(|entry| entry.stream.upgrade())
            .collect()
    }

    fn push_global(&self, stream: &LogStream) {
        let mut guard = self.streams.write();
        let mut next: Vec<GlobalEntry> = guard.iter().cloned().collect();
        next.push(GlobalEntry {
            id: stream.id(),
            stream: stream.self_weak.clone(),
        });
        *guard = Arc::new(next);
    }

    fn remove_global(&self, id: u64) {
        let mut guard = self.streams.write();
        if !guard.iter().any(|entry| entry.id == id) {
            return;
        }
        let next: Vec<GlobalEntry> = guard
            .iter()
            .filter(|entry| entry.id != id)
            .cloned()
            .collect();
        *guard = Arc::new(next);
    }

    fn release_thunk_ref(&self) {
        if self.thunk_refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.host.remove();
        }
    }
}

/// Thread-aware registry of attached [`LogStream`]s.
///
/// An explicit service object: the process-wide instance lives behind
/// [`LogStreamRegistry::global`], and tests construct independent
/// registries over fake hosts.
pub struct LogStreamRegistry {
    inner: Arc<RegistryInner>,
}

impl LogStreamRegistry {
    /// Create an independent registry over `host`.
    pub fn new(host: Box<dyn LogCallbackHost>) -> Self {
        LogStreamRegistry {
            inner: Arc::new(RegistryInner {
                streams: RwLock::new(Arc::new(Vec::new())),
                thunk_refs: AtomicUsize::new(0),
                host,
            }),
        }
    }

    /// The process-wide registry wired to the native library. Registered
    /// with the library manager so that freeing the library force-detaches
    /// every stream before the OS handle is released.
    pub fn global() -> &'static LogStreamRegistry {
        static GLOBAL: Lazy<LogStreamRegistry> = Lazy::new(|| {
            let registry = LogStreamRegistry::new(Box::new(NativeLogHost));
            let inner = Arc::downgrade(&registry.inner);
            NativeLibrary::instance().on_event(move |event| {
                if event == LibraryEvent::Freed {
                    if let Some(inner) = inner.upgrade() {
                        RegistryInner::detach_all(&inner);
                    }
                }
            });
            registry
        });
        &GLOBAL
    }

    /// Attach `stream` on the calling thread. See [`LogStream::attach`].
    pub fn attach(&self, stream: &LogStream) -> bool {
        RegistryInner::attach(&self.inner, stream)
    }

    /// Detach `stream` from the calling thread. See [`LogStream::detach`].
    pub fn detach(&self, stream: &LogStream) -> bool {
        RegistryInner::detach(&self.inner, stream)
    }

    /// Force-detach every attached stream, from any thread.
    pub fn detach_all(&self) {
        RegistryInner::detach_all(&self.inner);
    }

    /// Deliver a message to the streams attached by the calling thread.
    pub fn dispatch(&self, message: &str) {
        RegistryInner::dispatch(&self.inner, message);
    }

    /// Number of streams currently attached, across all threads.
    pub fn attached_count(&self) -> usize {
        self.inner.attached_count()
    }

    /// Snapshot of the attached streams, in attach order.
    pub fn attached_streams(&self) -> Vec<Arc<LogStream>> {
        self.inner.attached_streams()
    }
}
