//! Excel出力（rust_xlsxwriter）

use super::output_columns;
use crate::error::Result;
use catalog_match_common::{AnnotatedRow, CellValue, Schema};
use rust_xlsxwriter::{Color, Format, FormatBorder, Workbook};
use std::path::Path;

const SHEET_NAME: &str = "照合結果";
const REASON_COL_WIDTH: f64 = 60.0;

pub fn write_excel(rows: &[AnnotatedRow], schema: &Schema, output: &Path) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA));

    let columns = output_columns(schema);
    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *name, &header_format)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    let names = schema.names();
    let match_col = names.len() as u16;

    for (index, row) in rows.iter().enumerate() {
        let r = index as u32 + 1;
        for (col, name) in names.iter().enumerate() {
            match row.source.get(name) {
                Some(CellValue::Number(n)) => {
                    worksheet.write_number(r, col as u16, *n)?;
                }
                Some(CellValue::Text(s)) => {
                    worksheet.write_string(r, col as u16, s)?;
                }
                _ => {}
            }
        }
        worksheet.write_string(r, match_col, row.verdict.kind.as_str())?;
        worksheet.write_string(r, match_col + 1, &row.verdict.reason)?;
        if let Some(target) = &row.verdict.matched_target_ref {
            worksheet.write_string(r, match_col + 2, target)?;
        }
    }

    worksheet.set_column_width(match_col + 1, REASON_COL_WIDTH)?;
    workbook.save(output)?;
    Ok(())
}
