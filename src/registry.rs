//! 登録済みカタログ管理
//!
//! カタログ名 → 外部ストアのファイルID の対応を JSON ファイルに保存する。
//! 登録のたびにファイル全体を書き直す。

use crate::error::{CatalogMatchError, Result};
use crate::matcher::CompletionService;
use catalog_match_common::CorpusHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// 登録エントリ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredCatalog {
    pub file_id: String,
    pub source_path: PathBuf,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CatalogRegistry {
    path: PathBuf,
    entries: BTreeMap<String, RegisteredCatalog>,
}

impl CatalogRegistry {
    /// 読み込み（ファイルが無ければ空）
    pub fn load(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                CatalogMatchError::Config(format!("登録ファイルが壊れています {}: {}", path.display(), e))
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    /// エントリを追加して即保存（同名は置き換え）
    pub fn insert(&mut self, name: &str, file_id: String, source_path: &Path) -> Result<()> {
        self.entries.insert(
            name.to_string(),
            RegisteredCatalog {
                file_id,
                source_path: source_path.to_path_buf(),
                registered_at: Utc::now(),
            },
        );
        self.save()
    }

    /// カタログをアップロードして登録
    pub async fn register<S: CompletionService>(
        &mut self,
        service: &S,
        name: &str,
        source_path: &Path,
    ) -> Result<CorpusHandle> {
        if !source_path.exists() {
            return Err(CatalogMatchError::FileNotFound(source_path.display().to_string()));
        }
        let file_id = service.upload_file(source_path).await?;
        info!(catalog = name, file_id = %file_id, "catalog uploaded");
        self.insert(name, file_id.clone(), source_path)?;

        Ok(CorpusHandle {
            catalog_name: name.to_string(),
            external_reference: file_id,
        })
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredCatalog> {
        self.entries.get(name)
    }

    /// 名前から照合用ハンドルを取得
    pub fn handle(&self, name: &str) -> Result<CorpusHandle> {
        self.get(name)
            .map(|entry| CorpusHandle {
                catalog_name: name.to_string(),
                external_reference: entry.file_id.clone(),
            })
            .ok_or_else(|| CatalogMatchError::UnknownCatalog(name.to_string()))
    }

    pub fn list(&self) -> impl Iterator<Item = (&String, &RegisteredCatalog)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
