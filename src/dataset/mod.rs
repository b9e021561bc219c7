//! 表データ読み込みモジュール
//!
//! CSV（csv）と Excel/ODS（calamine）を読み込み、スキーマを検証した
//! `Dataset` を返す。読み込み失敗は照合開始前の致命的エラー。

mod excel;

use crate::error::{CatalogMatchError, Result};
use catalog_match_common::{CellValue, Dataset};
use std::path::Path;
use tracing::info;

const EXCEL_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// ファイル形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Excel,
}

impl SourceFormat {
    pub fn detect(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if EXCEL_EXTENSIONS.contains(&ext.as_str()) {
            SourceFormat::Excel
        } else {
            SourceFormat::Csv
        }
    }
}

/// 表データを読み込む
///
/// # Arguments
/// * `path` - CSV / Excel ファイル
/// * `sheet` - Excel のシート名（省略時は先頭シート）
pub fn load_dataset(path: &Path, sheet: Option<&str>) -> Result<Dataset> {
    if !path.exists() {
        return Err(CatalogMatchError::FileNotFound(path.display().to_string()));
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let (headers, records) = match SourceFormat::detect(path) {
        SourceFormat::Csv => read_csv(path)?,
        SourceFormat::Excel => excel::read_sheet(path, sheet)?,
    };

    let dataset = Dataset::from_records(name, headers, records)
        .map_err(|e| CatalogMatchError::Load(e.to_string()))?;

    info!(
        path = %path.display(),
        rows = dataset.len(),
        columns = dataset.schema().len(),
        "dataset loaded"
    );

    Ok(dataset)
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<CellValue>>)> {
    let load_err = |e: csv::Error| CatalogMatchError::Load(format!("{}: {}", path.display(), e));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(load_err)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(load_err)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() {
        return Err(CatalogMatchError::Load(format!(
            "{}: ヘッダー行がありません",
            path.display()
        )));
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(load_err)?;
        // CSVは文字列のまま保持（先頭ゼロのSKU等を壊さない）
        records.push(record.iter().map(CellValue::from_text).collect());
    }

    Ok((headers, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_match_common::ColumnKind;
    use std::fs;

    #[test]
    fn test_detect_format() {
        assert_eq!(SourceFormat::detect(Path::new("a.csv")), SourceFormat::Csv);
        assert_eq!(SourceFormat::detect(Path::new("a.XLSX")), SourceFormat::Excel);
        assert_eq!(SourceFormat::detect(Path::new("a.ods")), SourceFormat::Excel);
        assert_eq!(SourceFormat::detect(Path::new("noext")), SourceFormat::Csv);
    }

    #[test]
    fn test_load_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        fs::write(&path, "sku,name,price\n0001,Bronze Urn,120\n0002,,80\n").unwrap();

        let ds = load_dataset(&path, None).unwrap();
        assert_eq!(ds.name(), "export");
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.schema().names(), vec!["sku", "name", "price"]);
        assert_eq!(ds.schema().columns()[2].kind, ColumnKind::Number);
        assert_eq!(ds.rows()[0].get("sku").unwrap().to_string(), "0001");
        assert!(ds.rows()[1].get("name").unwrap().is_empty());
    }

    #[test]
    fn test_load_csv_ragged_row_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "sku,name\n0001\n").unwrap();

        let err = load_dataset(&path, None).unwrap_err();
        assert!(matches!(err, CatalogMatchError::Load(_)));
    }

    #[test]
    fn test_load_csv_duplicate_header_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.csv");
        fs::write(&path, "sku,sku\n1,2\n").unwrap();

        let err = load_dataset(&path, None).unwrap_err();
        assert!(matches!(err, CatalogMatchError::Load(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_dataset(Path::new("/nonexistent/catalog.csv"), None).unwrap_err();
        assert!(matches!(err, CatalogMatchError::FileNotFound(_)));
    }
}
