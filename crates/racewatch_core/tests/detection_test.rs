//! Integration tests for conflict detection across real threads.

use std::sync::{Arc, Barrier};
use std::thread;

use racewatch_core::{
    AccessKind, ConflictKind, DetectorConfig, FileSink, ObjectId, PanicHandler,
    RecordingHandler, Registry, Reporter, StorageBackend, ThreadTag, ViolationHandler,
    ViolationPolicy,
};

fn recording_registry() -> (Arc<Registry>, Arc<RecordingHandler>) {
    let recorder = Arc::new(RecordingHandler::new());
    let reporter = Reporter::new(Arc::clone(&recorder) as Arc<dyn ViolationHandler>);
    let registry = Arc::new(Registry::new(StorageBackend::default(), reporter));
    (registry, recorder)
}

fn temp_log_path() -> std::path::PathBuf {
    let id = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("test_detection_{id}.log"))
}

/// Thread A holds `held` on `id` while thread B starts `attempted`.
/// Returns (A's tag, B's tag).
fn overlap(
    registry: &Arc<Registry>,
    id: ObjectId,
    held: AccessKind,
    attempted: AccessKind,
) -> (ThreadTag, ThreadTag) {
    let barrier = Arc::new(Barrier::new(2));

    let holder = {
        let registry = Arc::clone(registry);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let _guard = registry.scoped(id, held);
            barrier.wait(); // access is in flight
            barrier.wait(); // other thread finished its attempt
            ThreadTag::current()
        })
    };

    let intruder = {
        let registry = Arc::clone(registry);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            {
                let _guard = registry.scoped(id, attempted);
            }
            barrier.wait();
            ThreadTag::current()
        })
    };

    (holder.join().unwrap(), intruder.join().unwrap())
}

#[test]
fn test_read_during_foreign_write_is_reported() {
    let (registry, recorder) = recording_registry();
    let id = registry.register();

    let (a, b) = overlap(&registry, id, AccessKind::Write, AccessKind::Read);

    let violations = recorder.take();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].conflict, ConflictKind::ReadDuringWrite);
    assert_eq!(violations[0].thread, b);
    assert_eq!(violations[0].previous_thread, a);
    assert_eq!(violations[0].object, id);
}

#[test]
fn test_write_during_foreign_write_is_reported() {
    let (registry, recorder) = recording_registry();
    let id = registry.register();

    overlap(&registry, id, AccessKind::Write, AccessKind::Write);

    let kinds: Vec<_> = recorder.take().into_iter().map(|v| v.conflict).collect();
    assert_eq!(kinds, vec![ConflictKind::WriteDuringWrite]);
}

#[test]
fn test_write_during_foreign_read_is_reported() {
    let (registry, recorder) = recording_registry();
    let id = registry.register();

    overlap(&registry, id, AccessKind::Read, AccessKind::Write);

    let violations = recorder.take();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].conflict, ConflictKind::WriteDuringRead);
    assert_eq!(violations[0].attempted, AccessKind::Write);
    assert_eq!(violations[0].active, AccessKind::Read);
}

#[test]
fn test_overlapping_reads_are_silent() {
    let (registry, recorder) = recording_registry();
    let id = registry.register();

    overlap(&registry, id, AccessKind::Read, AccessKind::Read);

    assert!(recorder.is_empty());
    assert_eq!(registry.inspect(id).unwrap().readers, 0);
}

#[test]
fn test_many_concurrent_readers_never_report() {
    let (registry, recorder) = recording_registry();
    let id = registry.register();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..50_000 {
                    let _guard = registry.scoped_read(id);
                }
            })
        })
        .collect();

    for r in readers {
        r.join().unwrap();
    }

    assert!(recorder.is_empty());
    let snap = registry.inspect(id).unwrap();
    assert_eq!(snap.readers, 0);
    assert!(!snap.writing);
}

fn nest(registry: &Registry, id: ObjectId, depth: usize) {
    if depth == 0 {
        return;
    }
    let kind = if depth % 2 == 0 {
        AccessKind::Write
    } else {
        AccessKind::Read
    };
    let _guard = registry.scoped(id, kind);
    nest(registry, id, depth - 1);
}

#[test]
fn test_deep_same_thread_nesting_is_silent() {
    let (registry, recorder) = recording_registry();
    let id = registry.register();

    nest(&registry, id, 64);
    nest(&registry, id, 63);

    assert!(recorder.is_empty());
    assert_eq!(registry.inspect(id).unwrap().readers, 0);
}

#[test]
fn test_different_objects_are_independent() {
    let (registry, recorder) = recording_registry();
    let x = registry.register();
    let y = registry.register();
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let _guard = registry.scoped_write(x);
            barrier.wait();
            barrier.wait();
        })
    };

    barrier.wait();
    {
        let _guard = registry.scoped_write(y);
    }
    barrier.wait();
    writer.join().unwrap();

    assert!(recorder.is_empty());
}

#[test]
fn test_recreate_after_teardown_is_fresh() {
    let (registry, _) = recording_registry();
    let id = ObjectId::from_addr(0x5000_0000);

    let state = registry.get_or_create(id);
    state.read_started(ThreadTag::current(), |_| {});
    state.write_started(ThreadTag::current(), |_| {});
    drop(state);

    assert!(registry.destroy(id));

    let fresh = registry.get_or_create(id);
    let snap = fresh.snapshot();
    assert_eq!(snap.readers, 0);
    assert!(!snap.writing);
    assert!(snap.last_toucher.is_none());
}

#[test]
fn test_panic_policy_unwinds_and_balances() {
    let registry = Arc::new(Registry::new(
        StorageBackend::default(),
        Reporter::new(Arc::new(PanicHandler)),
    ));
    let id = registry.register();
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let registry = Arc::clone(&registry);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let _guard = registry.scoped_write(id);
            barrier.wait();
            barrier.wait();
        })
    };

    barrier.wait();
    let reader = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            let _guard = registry.scoped_read(id);
        })
    };
    assert!(reader.join().is_err());
    barrier.wait();
    writer.join().unwrap();

    let snap = registry.inspect(id).unwrap();
    assert_eq!(snap.readers, 0);
    assert!(!snap.writing);
    assert_eq!(registry.stats().violations, 1);
}

#[test]
fn test_configured_log_records_each_violation() {
    let path = temp_log_path();
    let config = DetectorConfig {
        policy: ViolationPolicy::Record,
        log_path: Some(path.clone()),
        ..DetectorConfig::default()
    };
    let registry = Arc::new(config.build().unwrap());
    let id = registry.register();

    overlap(&registry, id, AccessKind::Write, AccessKind::Read);
    overlap(&registry, id, AccessKind::Read, AccessKind::Write);

    let records = FileSink::read_all(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].conflict, ConflictKind::ReadDuringWrite);
    assert_eq!(records[1].conflict, ConflictKind::WriteDuringRead);
    assert!(records.iter().all(|r| r.object == id));
    assert_ne!(records[0].thread, records[0].previous_thread);

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_batch_config_reads_back_repeated_races() {
    let path = temp_log_path();
    let config = DetectorConfig {
        log_path: Some(path.clone()),
        ..DetectorConfig::batch()
    };
    let registry = Arc::new(config.build().unwrap());
    let id = registry.register();

    for _ in 0..5 {
        overlap(&registry, id, AccessKind::Write, AccessKind::Read);
    }

    assert_eq!(registry.stats().violations, 5);
    let records = FileSink::read_all(&path).unwrap();
    assert_eq!(records.len(), 5);
    assert!(records
        .iter()
        .all(|r| r.object == id && r.conflict == ConflictKind::ReadDuringWrite));

    std::fs::remove_file(&path).ok();
}

#[test]
fn test_bounded_config_tracks_up_to_capacity() {
    let config = DetectorConfig::from_toml_str(
        "policy = \"record\"\n[storage]\nbackend = \"bounded\"\ncapacity = 2\n",
    )
    .unwrap();
    let registry = config.build().unwrap();

    let a = registry.register();
    let b = registry.register();
    assert_eq!(registry.stats().tracked, 2);

    assert!(registry.on_destroy(a));
    let c = registry.register();
    assert!(registry.is_tracked(b));
    assert!(registry.is_tracked(c));
    assert!(!registry.is_tracked(a));
}
