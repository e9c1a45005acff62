//! End-to-end lifecycle scenarios: log replay across reopen, snapshot
//! round-trips, table growth under load, and a randomized workload checked
//! against a reference map.

use hashbrown::HashMap;
use hoard_core::{Config, Store, APPEND_ONLY, DEFAULT_CONTENT_TYPE, KEY_MAX};
use tempfile::TempDir;

fn compact(dir: &TempDir, features: u32) -> Store {
    Store::open_with_config(dir.path(), "db", features, Config::compact()).unwrap()
}

#[test]
fn aol_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let mut store = compact(&dir, APPEND_ONLY);
        store.put(b"a", b"1").unwrap();
        store.put(b"b", b"2").unwrap();
        assert!(store.delete(b"a").unwrap());
        store.close().unwrap();
    }

    let store = compact(&dir, APPEND_ONLY);
    assert_eq!(store.get(b"a"), None);
    assert_eq!(store.get(b"b"), Some(&b"2"[..]));
    assert_eq!(store.len(), 1);
    store.close().unwrap();
}

#[test]
fn aol_replay_matches_direct_application() {
    let logged_dir = TempDir::new().unwrap();
    let direct_dir = TempDir::new().unwrap();

    let mut logged = compact(&logged_dir, APPEND_ONLY);
    let mut direct = compact(&direct_dir, 0);

    // A mixed workload: inserts, overwrites, deletes, re-inserts.
    let script: &[(&[u8], Option<&[u8]>)] = &[
        (b"one", Some(b"1")),
        (b"two", Some(b"2")),
        (b"one", Some(b"1.1")),
        (b"three", Some(b"3")),
        (b"two", None),
        (b"four", Some(b"4")),
        (b"two", Some(b"2.2")),
        (b"three", None),
    ];
    for (key, op) in script {
        match op {
            Some(value) => {
                logged.put(key, value).unwrap();
                direct.put(key, value).unwrap();
            }
            None => {
                logged.delete(key).unwrap();
                direct.delete(key).unwrap();
            }
        }
    }
    logged.close().unwrap();

    // Replaying the log must yield the same bindings as applying the
    // workload directly.
    let replayed = compact(&logged_dir, APPEND_ONLY);
    assert_eq!(replayed.len(), direct.len());
    for key in [&b"one"[..], b"two", b"three", b"four"] {
        assert_eq!(replayed.get(key), direct.get(key), "key {:?}", key);
    }
    replayed.close().unwrap();
    direct.close().unwrap();
}

#[test]
fn aol_preserves_content_type_across_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let mut store = compact(&dir, APPEND_ONLY);
        store.put_ct(b"page", b"<html/>", b"text/html").unwrap();
        store.close().unwrap();
    }

    let store = compact(&dir, APPEND_ONLY);
    assert_eq!(store.content_type(b"page"), Some(&b"text/html"[..]));
    store.close().unwrap();
}

#[test]
fn snapshot_roundtrip_resets_content_type() {
    let dir = TempDir::new().unwrap();

    let mut store = compact(&dir, 0);
    store.put_ct(b"x", b"hello", b"text/plain").unwrap();
    store.save().unwrap();
    store.close().unwrap();

    // Fresh store, no log: only the snapshot carries state.
    let empty_dir = TempDir::new().unwrap();
    let mut restored = compact(&empty_dir, 0);
    restored.load(&dir.path().join("db.dump")).unwrap();

    assert_eq!(restored.get(b"x"), Some(&b"hello"[..]));
    // The v1 snapshot format does not carry content-types.
    assert_eq!(restored.content_type(b"x"), Some(DEFAULT_CONTENT_TYPE));
    restored.close().unwrap();
}

#[test]
fn snapshot_roundtrip_many_records() {
    let dir = TempDir::new().unwrap();

    let mut store = compact(&dir, 0);
    for i in 0..5_000u32 {
        store
            .put(format!("key-{}", i).as_bytes(), format!("val-{}", i).as_bytes())
            .unwrap();
    }
    store.save().unwrap();
    store.close().unwrap();

    let other = TempDir::new().unwrap();
    let mut restored = compact(&other, 0);
    restored.load(&dir.path().join("db.dump")).unwrap();

    assert_eq!(restored.len(), 5_000);
    for i in (0..5_000u32).step_by(97) {
        assert_eq!(
            restored.get(format!("key-{}", i).as_bytes()),
            Some(format!("val-{}", i).as_bytes())
        );
    }
    restored.close().unwrap();
}

#[test]
fn close_save_writes_final_snapshot() {
    let dir = TempDir::new().unwrap();

    let mut store = compact(&dir, 0);
    store.put(b"final", b"state").unwrap();
    store.close_save().unwrap();

    let other = TempDir::new().unwrap();
    let mut restored = compact(&other, 0);
    restored.load(&dir.path().join("db.dump")).unwrap();
    assert_eq!(restored.get(b"final"), Some(&b"state"[..]));
    restored.close().unwrap();
}

#[test]
fn growth_keeps_every_key_reachable() {
    let dir = TempDir::new().unwrap();
    let mut store = compact(&dir, 0);

    let initial_slots = store.slot_count();
    for i in 0..initial_slots as u32 {
        store.put(format!("key-{}", i).as_bytes(), b"v").unwrap();
    }
    assert_eq!(store.slot_count(), initial_slots);

    // One more insert crosses load factor 1.0 and doubles the table.
    store.put(b"overflow", b"v").unwrap();
    assert_eq!(store.slot_count(), initial_slots * 2);

    for i in 0..initial_slots as u32 {
        assert_eq!(store.get(format!("key-{}", i).as_bytes()), Some(&b"v"[..]));
    }
    assert_eq!(store.get(b"overflow"), Some(&b"v"[..]));
    store.close().unwrap();
}

#[test]
fn clipped_key_findable_with_full_probe_after_reopen() {
    let dir = TempDir::new().unwrap();
    let long_key = vec![b'q'; KEY_MAX + 40];

    {
        let mut store = compact(&dir, APPEND_ONLY);
        store.put(&long_key, b"clipped").unwrap();
        store.close().unwrap();
    }

    let store = compact(&dir, APPEND_ONLY);
    assert_eq!(store.get(&long_key), Some(&b"clipped"[..]));
    assert_eq!(store.get(&long_key[..KEY_MAX]), Some(&b"clipped"[..]));
    store.close().unwrap();
}

#[test]
fn zero_length_key_and_value_survive_both_paths() {
    let dir = TempDir::new().unwrap();

    {
        let mut store = compact(&dir, APPEND_ONLY);
        store.put(b"", b"empty key").unwrap();
        store.put(b"empty value", b"").unwrap();
        store.save().unwrap();
        store.close().unwrap();
    }

    // Through the log.
    let store = compact(&dir, APPEND_ONLY);
    assert_eq!(store.get(b""), Some(&b"empty key"[..]));
    assert_eq!(store.get(b"empty value"), Some(&b""[..]));
    store.close().unwrap();

    // Through the snapshot.
    let other = TempDir::new().unwrap();
    let mut restored = compact(&other, 0);
    restored.load(&dir.path().join("db.dump")).unwrap();
    assert_eq!(restored.get(b""), Some(&b"empty key"[..]));
    assert_eq!(restored.get(b"empty value"), Some(&b""[..]));
    restored.close().unwrap();
}

#[test]
fn randomized_workload_matches_reference_map() {
    let dir = TempDir::new().unwrap();
    let mut store = compact(&dir, APPEND_ONLY);
    let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    // Deterministic pseudo-random walk over a small key space so
    // overwrites and deletes of live keys actually happen.
    let mut state = 0x2545_f491_4f6c_dd1du64;
    for _ in 0..10_000 {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;

        let key = format!("key-{}", state % 512).into_bytes();
        if state % 10 < 7 {
            let value = format!("val-{}", state % 8192).into_bytes();
            store.put(&key, &value).unwrap();
            model.insert(key, value);
        } else {
            let present = store.delete(&key).unwrap();
            assert_eq!(present, model.remove(&key).is_some());
        }
    }

    assert_eq!(store.len(), model.len() as u64);
    for (key, value) in &model {
        assert_eq!(store.get(key), Some(value.as_slice()), "key {:?}", key);
    }
    store.close().unwrap();

    // The full workload replays to the same state.
    let replayed = compact(&dir, APPEND_ONLY);
    assert_eq!(replayed.len(), model.len() as u64);
    for (key, value) in &model {
        assert_eq!(replayed.get(key), Some(value.as_slice()));
    }
    replayed.close().unwrap();
}

#[test]
fn truncated_log_recovers_prefix() {
    let dir = TempDir::new().unwrap();

    {
        let mut store = compact(&dir, APPEND_ONLY);
        store.put(b"kept", b"1").unwrap();
        store.put(b"also kept", b"2").unwrap();
        store.put(b"torn away", b"3").unwrap();
        store.close().unwrap();
    }

    // Tear the tail of the log mid-frame, as a crash would.
    let log = dir.path().join("db.aol");
    let data = std::fs::read(&log).unwrap();
    std::fs::write(&log, &data[..data.len() - 4]).unwrap();

    let store = compact(&dir, APPEND_ONLY);
    assert_eq!(store.get(b"kept"), Some(&b"1"[..]));
    assert_eq!(store.get(b"also kept"), Some(&b"2"[..]));
    assert_eq!(store.get(b"torn away"), None);
    store.close().unwrap();
}

#[test]
fn snapshot_untouched_by_unsaved_mutations() {
    let dir = TempDir::new().unwrap();

    let mut store = compact(&dir, 0);
    store.put(b"stable", b"v1").unwrap();
    store.save().unwrap();

    // Mutations after the save must not leak into the installed snapshot.
    store.put(b"stable", b"v2-unsaved").unwrap();
    store.close().unwrap();

    let other = TempDir::new().unwrap();
    let mut restored = compact(&other, 0);
    restored.load(&dir.path().join("db.dump")).unwrap();
    assert_eq!(restored.get(b"stable"), Some(&b"v1"[..]));
    restored.close().unwrap();
}
