mod common;

use std::fs;
use std::path::Path;
use std::time::Duration;

use common::{FakeCluster, Stored};
use valkey_migrate::config::KeyPattern;
use valkey_migrate::migrate::{
    load_import, run_export, run_import, CounterSummary, ExportOptions, ExportSummary,
    ImportOptions, RetryPolicy, Strategy,
};
use valkey_migrate::utils::MigrateError;

fn export_with(
    cluster: &FakeCluster,
    path: &Path,
    strategy: Strategy,
    pattern: &str,
    retries: u32,
) -> ExportSummary {
    let options = ExportOptions {
        pattern: KeyPattern::new(pattern).unwrap(),
        scan_batch: 10,
        strategy,
        retry: RetryPolicy { max_retries: retries },
        show_progress: false,
    };
    run_export(cluster, &options, path).unwrap()
}

fn export(cluster: &FakeCluster, path: &Path, strategy: Strategy) -> ExportSummary {
    export_with(cluster, path, strategy, "*", 0)
}

fn import_with(
    cluster: &FakeCluster,
    path: &Path,
    strategy: Strategy,
    pattern: &str,
    retries: u32,
) -> CounterSummary {
    let records = load_import(path, strategy, &KeyPattern::new(pattern).unwrap()).unwrap();
    let options = ImportOptions {
        retry: RetryPolicy { max_retries: retries },
        show_progress: false,
    };
    run_import(cluster, &records, &options)
}

fn import(cluster: &FakeCluster, path: &Path, strategy: Strategy) -> CounterSummary {
    import_with(cluster, path, strategy, "*", 0)
}

/// One key of every supported type, including binary data
fn populate_all_types(cluster: &FakeCluster) {
    cluster.put_string("s:plain", "hello");
    cluster.put("s:binary", Stored::Str(vec![0, 159, 146, 150, 255]), None);
    cluster.put("l:events", Stored::list(&["first", "second", "first"]), None);
    cluster.put("set:tags", Stored::set(&["red", "green", "blue"]), None);
    cluster.put(
        "z:board",
        Stored::zset(&[("alice", 10.0), ("bob", -2.5), ("carol", 1e6)]),
        None,
    );
    cluster.put(
        "h:profile",
        Stored::hash(&[("name", "Alice"), ("email", "a@example.com"), ("age", "30")]),
        None,
    );
}

#[test]
fn test_dump_round_trip_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(3);
    populate_all_types(&source);

    let summary = export(&source, &path, Strategy::Dump);
    assert_eq!(summary.discovered, 6);
    assert_eq!(summary.written, 6);
    assert_eq!(summary.capture.failed, 0);

    let target = FakeCluster::new(2);
    let restored = import(&target, &path, Strategy::Dump);
    assert_eq!(restored.succeeded, 6);
    assert_eq!(restored.failed, 0);

    for key in source.keys() {
        assert_eq!(
            target.dump_bytes(&key),
            source.dump_bytes(&key),
            "dump of {} differs",
            key
        );
    }
    assert!(target.commands().iter().all(|c| c == "RESTORE"));
}

#[test]
fn test_decomposed_round_trip_preserves_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(3);
    populate_all_types(&source);

    let summary = export(&source, &path, Strategy::Decomposed);
    assert_eq!(summary.written, 6);

    let target = FakeCluster::new(1);
    let restored = import(&target, &path, Strategy::Decomposed);
    assert_eq!(restored.succeeded, 6);

    for key in source.keys() {
        assert_eq!(target.value(&key), source.value(&key), "value of {} differs", key);
    }
    // List order and duplicates survive
    assert_eq!(
        target.value("l:events"),
        Some(Stored::list(&["first", "second", "first"]))
    );
}

#[test]
fn test_export_file_layout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(2);
    source.put_string("user:1", "alice");
    source.put("user:2", Stored::hash(&[("name", "bob")]), Some(Duration::from_secs(90)));

    export(&source, &path, Strategy::Decomposed);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let records = json.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["key"], "user:1");
    assert_eq!(records[0]["type"], "string");
    assert_eq!(records[0]["ttl"], 0);
    assert_eq!(records[0]["value"], "alice");
    assert!(records[0].get("dump").is_none());

    assert_eq!(records[1]["type"], "hash");
    assert_eq!(records[1]["value"]["name"], "bob");
    let ttl = records[1]["ttl"].as_i64().unwrap();
    assert!(ttl > 80_000_000_000 && ttl <= 90_000_000_000);
}

#[test]
fn test_ttl_fidelity_both_strategies() {
    for strategy in [Strategy::Dump, Strategy::Decomposed] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        let source = FakeCluster::new(2);
        source.put("expiring:str", Stored::Str(b"v".to_vec()), Some(Duration::from_secs(60)));
        source.put("expiring:set", Stored::set(&["a", "b"]), Some(Duration::from_secs(60)));
        source.put_string("forever:str", "v");
        source.put("forever:list", Stored::list(&["x"]), None);

        export(&source, &path, strategy);
        let target = FakeCluster::new(2);
        import(&target, &path, strategy);

        for key in ["expiring:str", "expiring:set"] {
            let ttl = target.ttl_ms(key).unwrap_or_else(|| panic!("{} lost its TTL ({})", key, strategy));
            assert!(ttl > 50_000 && ttl <= 60_000, "{} ttl {} ({})", key, ttl, strategy);
        }
        for key in ["forever:str", "forever:list"] {
            assert!(target.contains(key));
            assert_eq!(target.ttl_ms(key), None, "{} gained a TTL ({})", key, strategy);
        }
    }
}

#[test]
fn test_unsupported_type_fails_only_that_key() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(3);
    for i in 0..9 {
        source.put_string(&format!("k:{}", i), "v");
    }
    source.put("k:stream", Stored::Stream(vec![b"entry".to_vec()]), None);

    let summary = export(&source, &path, Strategy::Dump);

    assert_eq!(summary.discovered, 10);
    assert_eq!(summary.capture.attempted, 10);
    assert_eq!(summary.capture.succeeded, 9);
    assert_eq!(summary.capture.failed, 1);
    assert_eq!(summary.written, 9);
    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("k:stream"));
}

#[test]
fn test_non_numeric_score_is_a_per_key_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(1);
    source.put("z:good", Stored::zset(&[("a", 1.0)]), None);
    source.put("z:bad", Stored::zset(&[("a", 1.0)]), None);
    source.corrupt_scores("z:bad");

    let summary = export(&source, &path, Strategy::Decomposed);

    assert_eq!(summary.capture.failed, 1);
    assert_eq!(summary.written, 1);
}

#[test]
fn test_reimport_is_idempotent() {
    for strategy in [Strategy::Dump, Strategy::Decomposed] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        let source = FakeCluster::new(2);
        populate_all_types(&source);
        export(&source, &path, strategy);

        let target = FakeCluster::new(2);
        let first = import(&target, &path, strategy);
        let second = import(&target, &path, strategy);

        assert_eq!(first.succeeded, 6);
        assert_eq!(second.succeeded, 6, "second import failed with {}", strategy);
        assert_eq!(target.len(), 6);
        for key in source.keys() {
            assert_eq!(target.value(&key), source.value(&key), "{} after re-import ({})", key, strategy);
        }
    }
}

#[test]
fn test_empty_export_and_import() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(3);

    let summary = export(&source, &path, Strategy::Dump);
    assert_eq!(summary.discovered, 0);
    assert_eq!(summary.written, 0);
    assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");

    let records = load_import(&path, Strategy::Dump, &KeyPattern::default()).unwrap();
    assert!(records.is_empty());

    let target = FakeCluster::new(2);
    let restored = import(&target, &path, Strategy::Dump);
    assert_eq!(restored.attempted, 0);
    assert!(target.commands().is_empty());
    assert_eq!(target.len(), 0);
}

#[test]
fn test_user_pattern_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(3);
    source.put_string("user:1", "alice");
    source.put(
        "user:2",
        Stored::hash(&[("name", "bob"), ("email", "bob@example.com"), ("age", "41")]),
        None,
    );
    source.put_string("order:1", "pending");

    let summary = export_with(&source, &path, Strategy::Dump, "user:*", 0);
    assert_eq!(summary.written, 2);

    let target = FakeCluster::new(2);
    let restored = import(&target, &path, Strategy::Dump);
    assert_eq!(restored.succeeded, 2);

    let mut keys = target.keys();
    keys.sort();
    assert_eq!(keys, vec!["user:1", "user:2"]);
    assert_eq!(target.value("user:1"), source.value("user:1"));
    assert_eq!(target.value("user:2"), source.value("user:2"));
    assert!(!target.contains("order:1"));
}

#[test]
fn test_import_pattern_restores_a_subset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(2);
    source.put_string("user:1", "alice");
    source.put_string("order:1", "pending");
    export(&source, &path, Strategy::Decomposed);

    let target = FakeCluster::new(2);
    let restored = import_with(&target, &path, Strategy::Decomposed, "order:*", 0);

    assert_eq!(restored.attempted, 1);
    assert_eq!(target.keys(), vec!["order:1"]);
}

#[test]
fn test_integer_scores_in_file_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("import.json");
    fs::write(
        &path,
        r#"[
            {"key": "z", "type": "zset", "ttl": 0,
             "value": [{"member": "a", "score": 3}, {"member": "b", "score": "inf"}]},
            {"key": "broken", "type": "zset", "ttl": 0,
             "value": [{"member": "a", "score": "three"}]}
        ]"#,
    )
    .unwrap();

    let target = FakeCluster::new(1);
    let restored = import(&target, &path, Strategy::Decomposed);

    assert_eq!(restored.succeeded, 1);
    assert_eq!(restored.failed, 1);
    assert_eq!(
        target.value("z"),
        Some(Stored::zset(&[("a", 3.0), ("b", f64::INFINITY)]))
    );
    assert!(!target.contains("broken"));
}

#[test]
fn test_strategy_mismatch_is_fatal_before_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(2);
    populate_all_types(&source);
    export(&source, &path, Strategy::Dump);

    let err = load_import(&path, Strategy::Decomposed, &KeyPattern::default()).unwrap_err();
    assert!(matches!(
        err,
        MigrateError::StrategyMismatch {
            expected: "decomposed",
            found: "dump",
            ..
        }
    ));
}

#[test]
fn test_malformed_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    fs::write(&path, r#"[{"key": "a", "type": "string", "ttl": "soon", "dump": "AA=="}]"#).unwrap();

    let err = load_import(&path, Strategy::Dump, &KeyPattern::default()).unwrap_err();
    assert!(matches!(err, MigrateError::Serialization(_)));
}

#[test]
fn test_retry_recovers_transient_failures() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    let source = FakeCluster::new(2);
    source.put_string("flaky", "v");
    source.put_string("steady", "v");

    source.fail_transiently("flaky", 2);
    let summary = export_with(&source, &path, Strategy::Dump, "*", 2);
    assert_eq!(summary.capture.succeeded, 2);
    assert_eq!(summary.capture.retried, 2);

    let target = FakeCluster::new(2);
    target.fail_transiently("flaky", 1);
    let restored = import_with(&target, &path, Strategy::Dump, "*", 0);
    assert_eq!(restored.succeeded, 1);
    assert_eq!(restored.failed, 1);
    assert!(!target.contains("flaky"));

    let restored = import_with(&target, &path, Strategy::Dump, "*", 1);
    assert_eq!(restored.failed, 0);
    assert!(target.contains("flaky"));
}
