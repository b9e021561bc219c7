//! 照合結果キャッシュモジュール
//!
//! 行のフィンガープリントとカタログ識別子をキーにして意味照合の結果を保存し、
//! 同じ行の再照合（補完サービス呼び出し）をスキップする。

use crate::error::Result;
use catalog_match_common::{MatchKind, MatchVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 読み込み結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLoadStatus {
    Missing,
    Loaded,
    /// 壊れていたので空から開始
    Corrupt,
    VersionMismatch,
}

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// キャッシュキー → 照合結果のマップ
    entries: HashMap<String, CacheEntry>,
    #[serde(skip)]
    path: PathBuf,
    #[serde(skip)]
    dirty: bool,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub match_kind: MatchKind,
    pub match_reason: String,
    #[serde(default)]
    pub matched_target_reference: Option<String>,
    #[serde(default)]
    pub confidence: Option<u8>,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn verdict(&self) -> MatchVerdict {
        MatchVerdict {
            kind: self.match_kind,
            reason: self.match_reason.clone(),
            matched_target_ref: self.matched_target_reference.clone(),
            confidence: self.confidence,
        }
    }
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    fn empty(path: &Path) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
            path: path.to_path_buf(),
            dirty: false,
        }
    }

    /// キャッシュファイルを読み込み
    ///
    /// 存在しない・壊れている・バージョン違いの場合は空のキャッシュを返す。
    pub fn load(path: &Path) -> (Self, CacheLoadStatus) {
        if !path.exists() {
            return (Self::empty(path), CacheLoadStatus::Missing);
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache unreadable, starting empty");
                return (Self::empty(path), CacheLoadStatus::Corrupt);
            }
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, CacheFile>(reader) {
            Ok(mut cache) => {
                // バージョンチェック
                if cache.version != Self::CURRENT_VERSION {
                    warn!(
                        path = %path.display(),
                        found = cache.version,
                        expected = Self::CURRENT_VERSION,
                        "cache version mismatch, starting empty"
                    );
                    return (Self::empty(path), CacheLoadStatus::VersionMismatch);
                }
                cache.path = path.to_path_buf();
                debug!(entries = cache.entries.len(), "cache loaded");
                (cache, CacheLoadStatus::Loaded)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache corrupt, starting empty");
                (Self::empty(path), CacheLoadStatus::Corrupt)
            }
        }
    }

    /// キャッシュをルックアップ
    pub fn get(&self, key: &str) -> Option<MatchVerdict> {
        self.entries.get(key).map(CacheEntry::verdict)
    }

    /// キャッシュに追加
    ///
    /// 保存対象外の種別（Direct / Error）と既存キーは無視する。追加したら true。
    pub fn put(&mut self, key: String, verdict: &MatchVerdict) -> bool {
        if !verdict.kind.is_cacheable() || self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(
            key,
            CacheEntry {
                match_kind: verdict.kind,
                match_reason: verdict.reason.clone(),
                matched_target_reference: verdict.matched_target_ref.clone(),
                confidence: verdict.confidence,
                cached_at: Utc::now(),
            },
        );
        self.dirty = true;
        true
    }

    /// 変更があればファイル全体を書き直す
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        self.dirty = false;
        debug!(path = %self.path.display(), entries = self.entries.len(), "cache flushed");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// キャッシュ件数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 種別ごとの件数
    pub fn count_by_kind(&self) -> Vec<(MatchKind, usize)> {
        MatchKind::ALL
            .iter()
            .filter(|kind| kind.is_cacheable())
            .map(|kind| {
                let count = self.entries.values().filter(|e| e.match_kind == *kind).count();
                (*kind, count)
            })
            .collect()
    }

    /// キャッシュファイルを削除。削除したら true。
    pub fn clear(path: &Path) -> Result<bool> {
        if path.exists() {
            std::fs::remove_file(path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
