//! CSV出力

use super::output_columns;
use crate::error::Result;
use catalog_match_common::{AnnotatedRow, Schema};
use std::path::Path;

pub fn write_csv(rows: &[AnnotatedRow], schema: &Schema, output: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output)?;
    writer.write_record(output_columns(schema))?;

    for row in rows {
        let mut record: Vec<String> = schema
            .names()
            .iter()
            .map(|name| row.source.get(name).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        record.push(row.verdict.kind.as_str().to_string());
        record.push(row.verdict.reason.clone());
        record.push(row.verdict.matched_target_ref.clone().unwrap_or_default());
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}
