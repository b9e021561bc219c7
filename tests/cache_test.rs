//! キャッシュ機能テスト
//!
//! 照合結果キャッシュの保存・読み込み・破損時の挙動を検証

use catalog_match::matcher::{CacheFile, CacheLoadStatus};
use catalog_match_common::{MatchKind, MatchVerdict};
use tempfile::tempdir;

fn verdict(kind: MatchKind, reason: &str, target: Option<&str>) -> MatchVerdict {
    MatchVerdict {
        kind,
        reason: reason.to_string(),
        matched_target_ref: target.map(String::from),
        confidence: Some(8),
    }
}

/// 空のキャッシュファイル
#[test]
fn test_cache_file_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let (cache, status) = CacheFile::load(&dir.path().join("cache.json"));

    assert_eq!(status, CacheLoadStatus::Missing);
    assert_eq!(cache.len(), 0);
    assert!(cache.is_empty());
}

/// キャッシュの保存と読み込み
#[test]
fn test_cache_save_and_load() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("cache.json");

    let (mut cache, _) = CacheFile::load(&path);
    assert!(cache.put(
        "abc123".to_string(),
        &verdict(MatchKind::Semantic, "same bronze urn", Some("U-1")),
    ));
    cache.flush().expect("キャッシュ保存失敗");

    // 再読み込み
    let (loaded, status) = CacheFile::load(&path);
    assert_eq!(status, CacheLoadStatus::Loaded);
    assert_eq!(loaded.len(), 1);

    let cached = loaded.get("abc123").expect("キャッシュが見つからない");
    assert_eq!(cached.kind, MatchKind::Semantic);
    assert_eq!(cached.reason, "same bronze urn");
    assert_eq!(cached.matched_target_ref.as_deref(), Some("U-1"));
    assert_eq!(cached.confidence, Some(8));
}

/// キャッシュの複数エントリと種別集計
#[test]
fn test_cache_multiple_entries() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("cache.json");

    let (mut cache, _) = CacheFile::load(&path);
    cache.put("a".into(), &verdict(MatchKind::Semantic, "r1", Some("#1")));
    cache.put("b".into(), &verdict(MatchKind::NoMatch, "r2", None));
    cache.put("c".into(), &verdict(MatchKind::NoMatch, "r3", None));
    cache.put("d".into(), &MatchVerdict::error("HTTP 500"));

    assert_eq!(cache.len(), 3);
    assert!(cache.get("d").is_none());

    let counts = cache.count_by_kind();
    assert!(counts.contains(&(MatchKind::Semantic, 1)));
    assert!(counts.contains(&(MatchKind::NoMatch, 2)));
}

/// 壊れたキャッシュは空として扱う
#[test]
fn test_corrupt_cache_starts_empty() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("cache.json");
    std::fs::write(&path, "{ not json").unwrap();

    let (mut cache, status) = CacheFile::load(&path);
    assert_eq!(status, CacheLoadStatus::Corrupt);
    assert!(cache.is_empty());

    // 次の保存で正常なファイルに置き換わる
    cache.put("k".into(), &verdict(MatchKind::NoMatch, "none", None));
    cache.flush().unwrap();
    let (_, status) = CacheFile::load(&path);
    assert_eq!(status, CacheLoadStatus::Loaded);
}

/// キャッシュ削除
#[test]
fn test_cache_clear() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("cache.json");

    let (mut cache, _) = CacheFile::load(&path);
    cache.put("k".into(), &verdict(MatchKind::NoMatch, "none", None));
    cache.flush().unwrap();

    assert!(CacheFile::clear(&path).unwrap());
    assert!(!path.exists());
    assert!(!CacheFile::clear(&path).unwrap());
}
