//! Attachable log streams.
//!
//! A [`LogStream`] is a client-owned listener for messages emitted by the
//! native library. Streams attach to the process-wide
//! [`LogStreamRegistry`], which multiplexes every attached stream onto a
//! single native callback registration and routes delivery per thread: a
//! stream attached on thread A receives exactly the messages produced by
//! native calls running on thread A.

mod registry;

pub use registry::{LogCallbackHost, LogStreamRegistry};

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use self::registry::RegistryInner;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Receives messages delivered to one [`LogStream`].
pub trait LogSink: Send + Sync {
    /// Handle one message together with the stream's user-data tag.
    fn write(&self, message: &str, user_data: &str);

    /// Called when the owning stream becomes attached and may start
    /// receiving messages.
    fn attached(&self) {}

    /// Called when the owning stream is fully detached.
    fn detached(&self) {}
}

impl<F> LogSink for F
where
    F: Fn(&str, &str) + Send + Sync,
{
    fn write(&self, message: &str, user_data: &str) {
        self(message, user_data)
    }
}

/// Sink that writes messages to stdout, prefixed with the stream's tag.
pub struct ConsoleLogSink;

impl LogSink for ConsoleLogSink {
    fn write(&self, message: &str, user_data: &str) {
        // Native messages carry their own newline.
        if user_data.is_empty() {
            print!("{message}");
        } else {
            print!("{user_data}: {message}");
        }
    }
}

/// A client-owned log listener.
///
/// Lifecycle: constructed, then zero or more attach/detach cycles, then
/// disposed. Disposal (explicit or on drop) force-detaches the stream no
/// matter how many attachments it still holds. The registry only ever
/// keeps non-owning references, so dropping the last `Arc` is always safe.
pub struct LogStream {
    id: u64,
    user_data: RwLock<String>,
    sink: Box<dyn LogSink>,
    attach_count: AtomicUsize,
    disposed: AtomicBool,
    registry: Mutex<Weak<RegistryInner>>,
    // Handed to the registry on attach; the registry never owns streams.
    self_weak: Weak<LogStream>,
}

impl LogStream {
    /// Create a stream delivering to `sink`. Closures taking
    /// `(message, user_data)` implement [`LogSink`] directly.
    pub fn new(sink: impl LogSink + 'static) -> Arc<Self> {
        LogStream::with_user_data(sink, "")
    }

    /// Create a stream with a user-data tag handed to the sink on every
    /// message.
    pub fn with_user_data(sink: impl LogSink + 'static, user_data: impl Into<String>) -> Arc<Self> {
        let user_data = user_data.into();
        Arc::new_cyclic(|self_weak| LogStream {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            user_data: RwLock::new(user_data),
            sink: Box::new(sink),
            attach_count: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
            registry: Mutex::new(Weak::new()),
            self_weak: self_weak.clone(),
        })
    }

    /// Create a stream that prints to the console.
    pub fn console() -> Arc<Self> {
        LogStream::new(ConsoleLogSink)
    }

    /// Create a console stream with a tag.
    pub fn console_with(user_data: impl Into<String>) -> Arc<Self> {
        LogStream::with_user_data(ConsoleLogSink, user_data)
    }

    /// Unique identity of this stream.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The user-data tag delivered alongside every message.
    pub fn user_data(&self) -> String {
        self.user_data.read().clone()
    }

    /// Replace the user-data tag.
    pub fn set_user_data(&self, user_data: impl Into<String>) {
        *self.user_data.write() = user_data.into();
    }

    /// Whether the stream currently holds at least one attachment.
    pub fn is_attached(&self) -> bool {
        self.attach_count.load(Ordering::Acquire) > 0
    }

    /// Whether the stream is attached on the calling thread.
    pub fn is_attached_on_current_thread(&self) -> bool {
        let inner = self.registry.lock().upgrade();
        match inner {
            Some(inner) => registry::thread_holds(&inner, self.id),
            None => false,
        }
    }

    /// Whether the stream has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Attach to the stream's registry (the process-wide one unless the
    /// stream was previously attached through a specific registry).
    ///
    /// Returns `false` when the stream is already attached on this thread;
    /// attaching from another thread stacks a further attachment that must
    /// be balanced by its own detach.
    pub fn attach(&self) -> bool {
        // The guard must drop before the registry runs: attach writes the
        // registry back-reference through this same mutex.
        let inner = self.registry.lock().upgrade();
        match inner {
            Some(inner) => RegistryInner::attach(&inner, self),
            None => LogStreamRegistry::global().attach(self),
        }
    }

    /// Detach from the calling thread. Returns `false` when the stream is
    /// not attached on this thread; extra detaches are harmless no-ops.
    pub fn detach(&self) -> bool {
        let inner = self.registry.lock().upgrade();
        match inner {
            Some(inner) => RegistryInner::detach(&inner, self),
            None => false,
        }
    }

    /// Deliver a message to this stream's sink directly.
    pub fn log(&self, message: &str) {
        if message.is_empty() {
            return;
        }
        self.receive(message);
    }

    /// Force-detach and mark the stream disposed. Idempotent; also runs on
    /// drop as a backstop, though relying on drop while still attached is a
    /// caller-side gap rather than normal operation.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = self.registry.lock().upgrade();
        if let Some(inner) = inner {
            RegistryInner::force_detach(&inner, self);
        }
    }

    fn receive(&self, message: &str) {
        // Copy the tag out so a sink may call `set_user_data` re-entrantly.
        let user_data = self.user_data.read().clone();
        self.sink.write(message, &user_data);
    }

    fn notify_attached(&self) {
        self.sink.attached();
    }

    fn notify_detached(&self) {
        self.sink.detached();
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStream")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_log_delivers_message_and_tag_to_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = seen.clone();
        let stream = LogStream::with_user_data(
            move |message: &str, user_data: &str| {
                sink_seen.lock().push((message.to_string(), user_data.to_string()));
            },
            "importer",
        );

        stream.log("parsing mesh 0\n");
        stream.log("");

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], ("parsing mesh 0\n".to_string(), "importer".to_string()));
    }

    #[test]
    fn test_stream_ids_are_unique() {
        let a = LogStream::new(|_: &str, _: &str| {});
        let b = LogStream::new(|_: &str, _: &str| {});
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_set_user_data_applies_to_later_messages() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink_count = count.clone();
        let stream = LogStream::new(move |_: &str, user_data: &str| {
            if user_data == "late" {
                sink_count.fetch_add(1, Ordering::SeqCst);
            }
        });

        stream.log("one\n");
        stream.set_user_data("late");
        stream.log("two\n");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let stream = LogStream::new(|_: &str, _: &str| {});
        stream.dispose();
        stream.dispose();
        assert!(stream.is_disposed());
        assert!(!stream.is_attached());
    }
}
