//! End-to-end properties of the cache: fingerprint determinism, memoization,
//! drift detection, concurrent writers and expiry.

use std::fs::{self, File};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, SystemTime};

use debug_cache::{
    BincodeCodec, CacheMiss, CacheOptions, CallArgs, CallStore, CheckStatus, Codec, CodecError,
    ColumnData, Comparator, ContentHash, DebugCache, Fingerprint, Frame, Retention,
    SerializedCall, Series, Value,
};

fn codec() -> Arc<dyn Codec> {
    Arc::new(BincodeCodec)
}

fn dataset(x: Vec<f64>) -> Value {
    Value::Frame(
        Frame::new()
            .with_column("id", ColumnData::Int(vec![1, 2, 3]))
            .with_column("x", ColumnData::Float(x)),
    )
}

#[test]
fn keyword_order_does_not_change_fingerprint() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DebugCache::new(CacheOptions::at(dir.path())).unwrap();
    let a = CallArgs::new()
        .arg("report")
        .kwarg("year", 2024)
        .kwarg("region", "eu")
        .kwarg("scale", 1.5);
    let b = CallArgs::new()
        .arg("report")
        .kwarg("scale", 1.5)
        .kwarg("year", 2024)
        .kwarg("region", "eu");
    assert_eq!(cache.fingerprint("f", &a).unwrap().0, cache.fingerprint("f", &b).unwrap().0);
}

#[test]
fn structured_values_survive_the_codec() {
    let codec = BincodeCodec;
    let comparator = Comparator::new(Arc::new(BincodeCodec));
    let values = vec![
        dataset(vec![1.0, f64::NAN, 3.0]),
        Value::Series(Series::new(ColumnData::Str(vec!["a".into()])).named("s")),
        Value::from(vec![Value::Tuple(vec![Value::Null, Value::Bytes(vec![0, 1])])]),
        Value::Set(vec![Value::Int(3), Value::Int(1)]),
    ];
    for v in values {
        let back = codec.deserialize(&codec.serialize(&v).unwrap()).unwrap();
        assert!(comparator.equal(&v, &back).unwrap(), "{v} changed in transit");
    }
}

#[test]
fn miss_then_hit() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DebugCache::new(CacheOptions::at(dir.path())).unwrap();
    let calls = AtomicUsize::new(0);
    let load = cache.memoize("load", |_: &CallArgs| {
        calls.fetch_add(1, Ordering::SeqCst);
        dataset(vec![1.0, 2.0, 3.0])
    });
    let args = CallArgs::new().arg("data.csv");

    let (fp, _) = cache.fingerprint("load", &args).unwrap();
    assert_eq!(cache.store().get(&fp), Err(CacheMiss::NotFound));

    let first = load.call(&args).unwrap();
    assert!(cache.store().record_dir(&fp).join("a0").is_file());
    assert!(cache.store().result_path(&fp).is_file());

    let second = load.call(&args).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.comparator().equal(&first, &second).unwrap());
}

#[test]
fn drift_within_and_beyond_tolerance() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DebugCache::new(CacheOptions::at(dir.path())).unwrap();
    cache
        .memoize("load", |_: &CallArgs| dataset(vec![1.0, 2.0, 3.0]))
        .call(&CallArgs::new())
        .unwrap();
    let state = cache.list_states("load").unwrap().remove(0);

    let close = cache
        .replay("load", &state, |_: &CallArgs| dataset(vec![1.0, 2.0019, 3.0]))
        .unwrap();
    assert_eq!(close.status, CheckStatus::Matched);

    let far = cache
        .replay("load", &state, |_: &CallArgs| dataset(vec![1.0, 2.003, 3.0]))
        .unwrap();
    assert_eq!(
        far.status,
        CheckStatus::Drifted(vec![
            "Column x has 1 differing value(s)".to_string(),
            "  first one is at index 1, changed from 2.0 to 2.003".to_string(),
        ])
    );
}

#[test]
fn column_set_change_is_reported_alone() {
    let comparator = Comparator::new(codec());
    let old = Value::Frame(
        Frame::new()
            .with_column("a", ColumnData::Int(vec![1, 2]))
            .with_column("b", ColumnData::Int(vec![3, 4])),
    );
    let new = Value::Frame(
        Frame::new()
            .with_column("a", ColumnData::Int(vec![1, 2, 5]))
            .with_column("c", ColumnData::Str(vec!["x".to_string(); 3])),
    );
    assert!(!comparator.equal(&old, &new).unwrap());
    assert_eq!(
        comparator.explain(&old, &new),
        vec!["Removed columns: b".to_string(), "Added columns: c".to_string()]
    );
}

#[test]
fn racing_writers_leave_one_intact_payload() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CallStore::new(dir.path(), codec()));
    let fp = Fingerprint::from_parts("f", "race", ContentHash::from_bytes(b"race")).unwrap();
    let payloads: Vec<Vec<u8>> = vec![vec![1u8; 64 * 1024], vec![2u8; 64 * 1024]];
    let barrier = Arc::new(Barrier::new(payloads.len()));

    let handles: Vec<_> = payloads
        .iter()
        .cloned()
        .map(|payload| {
            let store = store.clone();
            let fp = fp.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let call = SerializedCall {
                    positional: vec![payload],
                    named: Vec::new(),
                };
                barrier.wait();
                store.put(&fp, &call, None)
            })
        })
        .collect();
    let kept: usize = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .sum();
    assert_eq!(kept, 1);

    let written = fs::read(store.record_dir(&fp).join("a0")).unwrap();
    assert!(payloads.contains(&written));
    let files: Vec<_> = fs::read_dir(store.record_dir(&fp)).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[test]
fn racing_result_overwrites_never_tear() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CallStore::new(dir.path(), codec()));
    let fp = Fingerprint::from_parts("f", "", ContentHash::from_bytes(b"")).unwrap();
    let results: Vec<Vec<u8>> = (0..4u8)
        .map(|i| BincodeCodec.serialize(&Value::Bytes(vec![i; 32 * 1024])).unwrap())
        .collect();

    thread::scope(|s| {
        for bytes in &results {
            let store = &store;
            let fp = &fp;
            s.spawn(move || store.put_result(fp, bytes).unwrap());
        }
    });

    let stored = fs::read(store.result_path(&fp)).unwrap();
    assert!(results.contains(&stored));
    assert_eq!(fs::read_dir(store.record_dir(&fp)).unwrap().count(), 1);
}

#[test]
fn expired_record_is_a_miss_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DebugCache::new(
        CacheOptions::at(dir.path()).with_retention(Retention::Ttl(Duration::from_secs(3600))),
    )
    .unwrap();
    let calls = AtomicUsize::new(0);
    let f = cache.memoize("f", |_: &CallArgs| {
        calls.fetch_add(1, Ordering::SeqCst);
        Value::Int(7)
    });
    let args = CallArgs::new().arg(1);
    f.call(&args).unwrap();
    f.call(&args).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let (fp, _) = cache.fingerprint("f", &args).unwrap();
    let past = SystemTime::now() - Duration::from_secs(60);
    File::options()
        .write(true)
        .open(cache.store().result_path(&fp))
        .unwrap()
        .set_modified(past)
        .unwrap();

    assert_eq!(cache.store().get(&fp), Err(CacheMiss::Expired));
    assert!(!cache.store().record_dir(&fp).exists());

    f.call(&args).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Keeps only the first 20 characters of strings, so distinct long string
/// arguments serialize, and therefore hash, identically.
struct TruncatingCodec;

impl Codec for TruncatingCodec {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::Str(s) => BincodeCodec.serialize(&Value::Str(s.chars().take(20).collect())),
            other => BincodeCodec.serialize(other),
        }
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        BincodeCodec.deserialize(bytes)
    }
}

#[test]
fn colliding_calls_share_a_record() {
    // Distinct calls that fingerprint identically are indistinguishable: the
    // second is served the first one's result.
    let dir = tempfile::tempdir().unwrap();
    let cache = DebugCache::new(CacheOptions::at(dir.path()))
        .unwrap()
        .with_codec(Arc::new(TruncatingCodec));
    let calls = AtomicUsize::new(0);
    let f = cache.memoize("f", |_: &CallArgs| {
        Value::Int(calls.fetch_add(1, Ordering::SeqCst) as i64 + 1)
    });

    let first = CallArgs::new().arg(format!("{}X", "a".repeat(20)));
    let second = CallArgs::new().arg(format!("{}Y", "a".repeat(20)));
    assert_ne!(first, second);
    let (fp_first, _) = cache.fingerprint("f", &first).unwrap();
    let (fp_second, _) = cache.fingerprint("f", &second).unwrap();
    assert_eq!(fp_first, fp_second);

    assert_eq!(f.call(&first).unwrap(), Value::Int(1));
    assert_eq!(f.call(&second).unwrap(), Value::Int(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.list_states("f").unwrap().len(), 1);
}

#[test]
fn corrupt_result_is_recomputed() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DebugCache::new(CacheOptions::at(dir.path())).unwrap();
    let calls = AtomicUsize::new(0);
    let f = cache.memoize("f", |_: &CallArgs| {
        calls.fetch_add(1, Ordering::SeqCst);
        Value::from("ok")
    });
    let args = CallArgs::new();
    f.call(&args).unwrap();

    let (fp, _) = cache.fingerprint("f", &args).unwrap();
    fs::write(cache.store().result_path(&fp), b"\xff\xff\xff").unwrap();
    assert!(matches!(cache.store().get(&fp), Err(CacheMiss::Corrupt { .. })));

    assert_eq!(f.call(&args).unwrap(), Value::from("ok"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.store().get(&fp).unwrap(), Value::from("ok"));
}

#[test]
fn partial_record_reads_as_miss() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DebugCache::new(CacheOptions::at(dir.path())).unwrap();
    let args = CallArgs::new().arg(1).kwarg("mode", "fast");
    let (fp, call) = cache.fingerprint("f", &args).unwrap();
    cache.store().put(&fp, &call, None).unwrap();

    assert!(cache.store().has_record(&fp));
    assert_eq!(cache.store().get(&fp), Err(CacheMiss::NotFound));
    assert_eq!(cache.load_call("f", &fp.state()).unwrap(), args);
}
