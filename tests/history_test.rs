use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;
use test_metrics::history::cache::JsonTrendCache;
use test_metrics::history::db::{artifact_name, SqliteTrendStore};
use test_metrics::history::{load_history, merge_histories, DurableStore, FastStore};
use test_metrics::model::{FrameworkKind, TestMetrics, TrendData};

fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

fn record(run: &str, matrix: Option<&str>, at: DateTime<Utc>, sha: &str) -> TrendData {
    TrendData {
        timestamp: at,
        commit_sha: sha.to_string(),
        metrics: TestMetrics {
            total_tests: 10,
            passed_tests: 9,
            failed_tests: 1,
            pass_rate: 90.0,
            total_duration: 12.5,
            ..TestMetrics::default()
        },
        run_id: run.to_string(),
        matrix_key: matrix.map(str::to_string),
    }
}

// ============================================================================
// JSON cache
// ============================================================================

#[test]
fn test_cache_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let cache = JsonTrendCache::new(dir.path(), "test-metrics", 30);
    assert!(cache.load().unwrap().is_empty());
    assert!(cache.latest().unwrap().is_none());
    assert!(cache.path().ends_with("test-metrics-trends.json"));
}

#[test]
fn test_cache_corrupt_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let cache = JsonTrendCache::new(dir.path(), "ci", 30);
    std::fs::write(cache.path(), "not json at all {{{").unwrap();
    assert!(cache.load().unwrap().is_empty());
}

#[test]
fn test_cache_record_applies_retention() {
    let dir = TempDir::new().unwrap();
    let cache = JsonTrendCache::new(&dir.path().join("nested"), "ci", 30);
    let now = Utc::now();

    cache.save(&[record("old", None, days_ago(45), "a")]).unwrap();
    let kept = cache.record(record("new", None, now, "b"), now).unwrap();
    assert_eq!(kept, 1);

    let loaded = cache.load().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].run_id, "new");
    assert_eq!(cache.latest().unwrap().unwrap().commit_sha, "b");
}

#[test]
fn test_cache_recent_window() {
    let dir = TempDir::new().unwrap();
    let cache = JsonTrendCache::new(dir.path(), "ci", 30);
    cache
        .save(&[
            record("3", None, days_ago(1), "c"),
            record("1", None, days_ago(20), "a"),
            record("2", None, days_ago(10), "b"),
        ])
        .unwrap();

    let recent = cache.recent(14, Utc::now()).unwrap();
    let runs: Vec<&str> = recent.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(runs, vec!["2", "3"]);
}

// ============================================================================
// SQLite store
// ============================================================================

#[test]
fn test_artifact_name() {
    assert_eq!(artifact_name(FrameworkKind::Jest, None), "test-metrics-trends-jest");
    assert_eq!(
        artifact_name(FrameworkKind::Playwright, Some("node18")),
        "test-metrics-trends-playwright-node18"
    );
    assert_eq!(artifact_name(FrameworkKind::Junit, Some("")), "test-metrics-trends-junit");
}

#[test]
fn test_store_load_recent_newest_first_window_oldest_first_order() {
    let dir = TempDir::new().unwrap();
    let store = SqliteTrendStore::new(dir.path(), "test-metrics-trends-jest".to_string(), 90).unwrap();

    for (run, days) in [("1", 5), ("2", 4), ("3", 3), ("4", 2)] {
        store.save(&record(run, None, days_ago(days), "sha")).unwrap();
    }

    let recent = store.load_recent(2).unwrap();
    let runs: Vec<&str> = recent.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(runs, vec!["3", "4"]);
    assert_eq!(recent[1].metrics.pass_rate, 90.0);
    assert_eq!(store.count().unwrap(), 4);
}

#[test]
fn test_store_upserts_by_run_and_matrix_key() {
    let dir = TempDir::new().unwrap();
    let store = SqliteTrendStore::new(dir.path(), "a".to_string(), 90).unwrap();

    store.save(&record("7", None, days_ago(1), "first")).unwrap();
    store.save(&record("7", None, days_ago(1), "second")).unwrap();
    store.save(&record("7", Some("os:linux"), days_ago(1), "matrix")).unwrap();

    assert_eq!(store.count().unwrap(), 2);
    let loaded = store.load_recent(10).unwrap();
    assert!(loaded.iter().any(|r| r.commit_sha == "second" && r.matrix_key.is_none()));
    assert!(loaded
        .iter()
        .any(|r| r.matrix_key.as_deref() == Some("os:linux")));
}

#[test]
fn test_store_scoped_by_artifact_name() {
    let dir = TempDir::new().unwrap();
    let jest = SqliteTrendStore::new(dir.path(), "test-metrics-trends-jest".to_string(), 90).unwrap();
    let junit = SqliteTrendStore::new(dir.path(), "test-metrics-trends-junit".to_string(), 90).unwrap();

    jest.save(&record("1", None, days_ago(1), "j")).unwrap();
    assert_eq!(jest.load_recent(10).unwrap().len(), 1);
    assert!(junit.load_recent(10).unwrap().is_empty());
}

#[test]
fn test_store_prunes_expired_records() {
    let dir = TempDir::new().unwrap();
    let store = SqliteTrendStore::new(dir.path(), "a".to_string(), 90).unwrap();

    store.save(&record("ancient", None, days_ago(120), "x")).unwrap();
    store.save(&record("fresh", None, days_ago(1), "y")).unwrap();

    let loaded = store.load_recent(10).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].run_id, "fresh");
}

#[test]
fn test_store_keeps_record_just_inside_retention() {
    let dir = TempDir::new().unwrap();
    let store = SqliteTrendStore::new(dir.path(), "a".to_string(), 90).unwrap();

    let edge = days_ago(90) + Duration::minutes(5);
    store.save(&record("edge", None, edge, "x")).unwrap();
    assert_eq!(store.count().unwrap(), 1);

    store.save(&record("next", None, days_ago(0), "y")).unwrap();
    let loaded = store.load_recent(10).unwrap();
    let runs: Vec<&str> = loaded.iter().map(|r| r.run_id.as_str()).collect();
    assert_eq!(runs, vec!["edge", "next"]);
}

// ============================================================================
// Merge
// ============================================================================

#[test]
fn test_merge_two_sources_dedups_on_key() {
    let t1 = days_ago(3);
    let t2 = days_ago(2);
    let fast = vec![record("1", None, t1, "fast")];
    let durable = vec![record("1", None, t1, "durable"), record("2", None, t2, "durable")];

    let merged = merge_histories(&fast, &durable);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].run_id, "1");
    assert_eq!(merged[0].commit_sha, "fast");
    assert_eq!(merged[1].run_id, "2");
    assert!(merged.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn test_load_history_from_both_stores() {
    let dir = TempDir::new().unwrap();
    let cache = JsonTrendCache::new(dir.path(), "ci", 30);
    let store = SqliteTrendStore::new(dir.path(), "test-metrics-trends-junit".to_string(), 90).unwrap();

    cache.save(&[record("2", None, days_ago(1), "fast")]).unwrap();
    store.save(&record("1", None, days_ago(60), "durable")).unwrap();
    store.save(&record("2", None, days_ago(1), "durable")).unwrap();

    let history = load_history(&cache, &store, 30);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].run_id, "1");
    assert_eq!(history[1].commit_sha, "fast");
}

struct BrokenStore;

impl DurableStore for BrokenStore {
    fn load_recent(&self, _limit: usize) -> anyhow::Result<Vec<TrendData>> {
        anyhow::bail!("artifact service unavailable")
    }

    fn save(&self, _record: &TrendData) -> anyhow::Result<()> {
        anyhow::bail!("artifact service unavailable")
    }
}

#[test]
fn test_failing_store_contributes_nothing() {
    let dir = TempDir::new().unwrap();
    let cache = JsonTrendCache::new(dir.path(), "ci", 30);
    cache.save(&[record("1", None, days_ago(1), "fast")]).unwrap();

    let history = load_history(&cache, &BrokenStore, 30);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].commit_sha, "fast");
}
