//! キャッシュキー（フィンガープリント）生成
//!
//! 行の値をキー順にソートしてシリアライズし、カタログ識別子と合わせて
//! SHA-256 を取る。同じ行・同じカタログなら常に同じキーになる。

use crate::types::{CorpusHandle, Dataset, Row};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// 行の正規化シリアライズ（列名でソート）
fn canonical_row(row: &Row) -> String {
    let sorted: BTreeMap<&str, String> = row
        .fields()
        .iter()
        .map(|(name, value)| (name.as_str(), value.to_string()))
        .collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// キャッシュキー
pub fn cache_key(row: &Row, catalog_identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_row(row).as_bytes());
    hasher.update([0x1f]);
    hasher.update(catalog_identity.as_bytes());
    hex::encode(hasher.finalize())
}

/// 表全体のダイジェスト（インライン照合時のカタログ識別に使用）
pub fn dataset_digest(dataset: &Dataset) -> String {
    let mut hasher = Sha256::new();
    for name in dataset.schema().names() {
        hasher.update(name.as_bytes());
        hasher.update([0x1f]);
    }
    for row in dataset.rows() {
        hasher.update([0x1e]);
        hasher.update(canonical_row(row).as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// インライン照合のカタログ識別子
pub fn inline_catalog_identity(catalog: &Dataset) -> String {
    let digest = dataset_digest(catalog);
    format!("inline:{}#{}", catalog.name(), &digest[..16])
}

/// 登録済みカタログ照合のカタログ識別子
pub fn corpus_catalog_identity(corpus: &CorpusHandle) -> String {
    format!("corpus:{}:{}", corpus.catalog_name, corpus.external_reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    fn row(pairs: &[(&str, &str)]) -> Row {
        Row::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), CellValue::from_text(v)))
                .collect(),
        )
    }

    #[test]
    fn test_cache_key_is_deterministic() {
        let r = row(&[("sku", "0001"), ("name", "Bronze Urn")]);
        assert_eq!(cache_key(&r, "catalog-a"), cache_key(&r, "catalog-a"));
        assert_eq!(cache_key(&r, "catalog-a").len(), 64);
    }

    #[test]
    fn test_cache_key_ignores_column_order() {
        let a = row(&[("sku", "0001"), ("name", "Bronze Urn")]);
        let b = row(&[("name", "Bronze Urn"), ("sku", "0001")]);
        assert_eq!(cache_key(&a, "c"), cache_key(&b, "c"));
    }

    #[test]
    fn test_cache_key_changes_with_catalog() {
        let r = row(&[("sku", "0001")]);
        assert_ne!(cache_key(&r, "catalog-a"), cache_key(&r, "catalog-b"));
    }

    #[test]
    fn test_cache_key_changes_with_value() {
        let a = row(&[("sku", "0001")]);
        let b = row(&[("sku", "0002")]);
        assert_ne!(cache_key(&a, "c"), cache_key(&b, "c"));
    }

    #[test]
    fn test_inline_identity_tracks_content() {
        let a = Dataset::from_records(
            "catalog",
            vec!["sku".into()],
            vec![vec![CellValue::from_text("1")]],
        )
        .unwrap();
        let b = Dataset::from_records(
            "catalog",
            vec!["sku".into()],
            vec![vec![CellValue::from_text("2")]],
        )
        .unwrap();
        assert!(inline_catalog_identity(&a).starts_with("inline:catalog#"));
        assert_ne!(inline_catalog_identity(&a), inline_catalog_identity(&b));
    }

    #[test]
    fn test_corpus_identity() {
        let handle = CorpusHandle {
            catalog_name: "vendor".into(),
            external_reference: "file-abc".into(),
        };
        assert_eq!(corpus_catalog_identity(&handle), "corpus:vendor:file-abc");
    }
}
