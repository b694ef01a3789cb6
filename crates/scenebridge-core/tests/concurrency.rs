//! Stress coverage: many worker threads cycling attach / simulated native
//! call / detach / dispose against one registry, the way concurrent
//! importer sessions drive the real thing.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use scenebridge_core::logging::{LogStream, LogStreamRegistry};

use common::CountingHost;

#[test]
fn test_concurrent_attach_dispatch_detach_stress() {
    const THREADS: usize = 64;
    const ITERATIONS: usize = 200;

    let host = CountingHost::new();
    let (installs, removes) = host.counters();
    let registry = LogStreamRegistry::new(Box::new(host));
    let delivered = Arc::new(AtomicUsize::new(0));

    thread::scope(|scope| {
        let registry = &registry;
        let delivered = &delivered;
        for _ in 0..THREADS {
            scope.spawn(move || {
                for _ in 0..ITERATIONS {
                    let sink_delivered = delivered.clone();
                    let stream = LogStream::new(move |_: &str, _: &str| {
                        sink_delivered.fetch_add(1, Ordering::Relaxed);
                    });

                    assert!(registry.attach(&stream));
                    // Stand-in for the log traffic of one native import.
                    registry.dispatch("reading chunk\n");
                    assert!(registry.detach(&stream));
                    stream.dispose();
                }
            });
        }
    });

    assert_eq!(registry.attached_count(), 0);
    assert!(registry.attached_streams().is_empty());
    // Every dispatch happened while its thread held exactly one stream.
    assert_eq!(delivered.load(Ordering::SeqCst), THREADS * ITERATIONS);
    // Install/remove traffic stayed balanced all the way down to zero.
    assert_eq!(
        installs.load(Ordering::SeqCst),
        removes.load(Ordering::SeqCst)
    );
    assert!(installs.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_stress_with_unbalanced_disposal() {
    const THREADS: usize = 32;
    const ITERATIONS: usize = 100;

    let host = CountingHost::new();
    let (installs, removes) = host.counters();
    let registry = LogStreamRegistry::new(Box::new(host));

    thread::scope(|scope| {
        let registry = &registry;
        for worker in 0..THREADS {
            scope.spawn(move || {
                for iteration in 0..ITERATIONS {
                    let stream = LogStream::new(|_: &str, _: &str| {});
                    assert!(registry.attach(&stream));
                    registry.dispatch("processing\n");
                    if (worker + iteration) % 2 == 0 {
                        // Dispose without a balancing detach; the forced
                        // path must still release the thunk reference.
                        stream.dispose();
                    } else {
                        assert!(registry.detach(&stream));
                    }
                }
            });
        }
    });

    assert_eq!(registry.attached_count(), 0);
    assert_eq!(
        installs.load(Ordering::SeqCst),
        removes.load(Ordering::SeqCst)
    );
}
