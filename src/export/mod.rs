//! 照合結果の書き出し
//!
//! 出力ファイルの拡張子で形式を選ぶ（.csv / .xlsx / .json）。
//! 列順はソース表の列 → `match_kind` → `match_reason` → `matched_target_reference`。

pub mod csv_file;
pub mod excel;

use crate::error::{CatalogMatchError, Result};
use catalog_match_common::{AnnotatedRow, Schema};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Excel),
            "json" => Ok(ExportFormat::Json),
            _ => Err(CatalogMatchError::Config(format!(
                "出力形式を判別できません: {}（.csv / .xlsx / .json）",
                path.display()
            ))),
        }
    }
}

/// 出力列名
pub fn output_columns(schema: &Schema) -> Vec<&str> {
    let mut columns = schema.names();
    columns.extend(AnnotatedRow::MATCH_COLUMNS);
    columns
}

/// 結果を書き出す
pub fn export_results(rows: &[AnnotatedRow], schema: &Schema, output: &Path) -> Result<ExportFormat> {
    let format = ExportFormat::from_path(output)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    match format {
        ExportFormat::Csv => csv_file::write_csv(rows, schema, output)?,
        ExportFormat::Excel => excel::write_excel(rows, schema, output)?,
        ExportFormat::Json => write_json(rows, output)?,
    }

    info!(path = %output.display(), rows = rows.len(), ?format, "results exported");
    Ok(format)
}

fn write_json(rows: &[AnnotatedRow], output: &Path) -> Result<()> {
    let writer = BufWriter::new(File::create(output)?);
    serde_json::to_writer_pretty(writer, rows)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("out.CSV")).unwrap(), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path(Path::new("out.xlsx")).unwrap(), ExportFormat::Excel);
        assert_eq!(ExportFormat::from_path(Path::new("out.json")).unwrap(), ExportFormat::Json);
        assert!(ExportFormat::from_path(Path::new("out.pdf")).is_err());
        assert!(ExportFormat::from_path(Path::new("out")).is_err());
    }
}
