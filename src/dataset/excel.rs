//! Excel / ODS 読み込み（calamine）

use crate::error::{CatalogMatchError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use catalog_match_common::CellValue;
use std::path::Path;

fn to_cell(value: &Data) -> CellValue {
    match value {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from_text(s),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        other => CellValue::from_text(&other.to_string()),
    }
}

/// 先頭行をヘッダーとしてシートを読み込む
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<(Vec<String>, Vec<Vec<CellValue>>)> {
    let mut workbook = open_workbook_auto(path)?;

    let range = match sheet {
        Some(name) => workbook.worksheet_range(name)?,
        None => workbook.worksheet_range_at(0).ok_or_else(|| {
            CatalogMatchError::Load(format!("{}: シートがありません", path.display()))
        })??,
    };

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| {
            CatalogMatchError::Load(format!("{}: ヘッダー行がありません", path.display()))
        })?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let records = rows
        .map(|row| row.iter().map(to_cell).collect())
        .collect();

    Ok((headers, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn test_read_sheet_numbers_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "sku").unwrap();
        sheet.write_string(0, 1, "name").unwrap();
        sheet.write_number(1, 0, 1234.0).unwrap();
        sheet.write_string(1, 1, "Patriot Urn").unwrap();
        workbook.save(&path).unwrap();

        let (headers, records) = read_sheet(&path, None).unwrap();
        assert_eq!(headers, vec!["sku", "name"]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0][0].to_string(), "1234");
        assert_eq!(records[0][1], CellValue::Text("Patriot Urn".into()));
    }
}
