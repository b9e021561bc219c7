//! 照合処理の型定義
//!
//! CLIと他のフロントエンドで共有される型:
//! - Row / Dataset / Schema: 読み込み済みの表データ
//! - MatchingRule: 直接照合ルール
//! - MatchVerdict: 1行分の照合結果
//! - AnnotatedRow: 出力テーブルの1行

use crate::error::{Error, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// セルの値
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// 文字列から生成（空白のみは Empty）
    pub fn from_text(value: &str) -> Self {
        if value.trim().is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// 照合用の正規化（前後空白除去 + 小文字化）
    pub fn normalized(&self) -> String {
        self.to_string().trim().to_lowercase()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            // 整数値は ".0" を付けない（SKU等がExcelで数値化されるため）
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// 列の型（読み込み時に推定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Text,
    Number,
    Empty,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Text => write!(f, "text"),
            ColumnKind::Number => write!(f, "number"),
            ColumnKind::Empty => write!(f, "empty"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// 列スキーマ（列名は大文字小文字を区別）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// 1行分のデータ（列順を保持）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new(fields: Vec<(String, CellValue)>) -> Self {
        Self { fields }
    }

    /// 列値を取得（列が存在しない場合は None）
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, CellValue)] {
        &self.fields
    }

    /// 全フィールドが空か
    pub fn is_blank(&self) -> bool {
        self.fields.iter().all(|(_, v)| v.is_empty())
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// 読み込み済みの表（カタログ or エクスポート）
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    name: String,
    schema: Schema,
    rows: Vec<Row>,
}

impl Dataset {
    /// ヘッダーとセル配列から生成し、スキーマを検証する
    ///
    /// - ヘッダーの重複・空欄はエラー
    /// - 列数がヘッダーと一致しない行はエラー
    pub fn from_records(
        name: impl Into<String>,
        headers: Vec<String>,
        records: Vec<Vec<CellValue>>,
    ) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for (i, header) in headers.iter().enumerate() {
            if header.trim().is_empty() {
                return Err(Error::Schema(format!(
                    "{}: {}列目のヘッダーが空です",
                    name,
                    i + 1
                )));
            }
            if !seen.insert(header.as_str()) {
                return Err(Error::Schema(format!(
                    "{}: ヘッダー「{}」が重複しています",
                    name, header
                )));
            }
        }

        let mut kinds = vec![ColumnKind::Empty; headers.len()];
        let mut rows = Vec::with_capacity(records.len());

        for (line, record) in records.into_iter().enumerate() {
            if record.len() != headers.len() {
                return Err(Error::Schema(format!(
                    "{}: {}行目の列数が不正です（期待 {}、実際 {}）",
                    name,
                    line + 2,
                    headers.len(),
                    record.len()
                )));
            }

            for (kind, value) in kinds.iter_mut().zip(&record) {
                *kind = merge_kind(*kind, value);
            }

            rows.push(Row::new(headers.iter().cloned().zip(record).collect()));
        }

        let columns = headers
            .into_iter()
            .zip(kinds)
            .map(|(name, kind)| Column { name, kind })
            .collect();

        Ok(Self {
            name,
            schema: Schema { columns },
            rows,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 行の識別子
    ///
    /// 識別子列が指定されていて値があればその値、なければ `#<1始まりの行番号>`
    pub fn row_identifier(&self, index: usize, identifier_column: Option<&str>) -> String {
        identifier_column
            .and_then(|col| self.rows.get(index).and_then(|row| row.get(col)))
            .filter(|value| !value.is_empty())
            .map(|value| value.to_string().trim().to_string())
            .unwrap_or_else(|| format!("#{}", index + 1))
    }
}

fn merge_kind(current: ColumnKind, value: &CellValue) -> ColumnKind {
    let observed = match value {
        CellValue::Empty => return current,
        CellValue::Text(s) if s.trim().is_empty() => return current,
        CellValue::Number(_) => ColumnKind::Number,
        CellValue::Text(s) if s.trim().parse::<f64>().is_ok() => ColumnKind::Number,
        CellValue::Text(_) => ColumnKind::Text,
    };
    match (current, observed) {
        (ColumnKind::Empty, kind) => kind,
        (ColumnKind::Number, ColumnKind::Number) => ColumnKind::Number,
        _ => ColumnKind::Text,
    }
}

/// 直接照合ルール
///
/// `source_row[source_column]` と `target_row[target_column]` が
/// 前後空白除去・大文字小文字無視で一致すれば直接一致とみなす
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingRule {
    pub label: String,
    pub source_column: String,
    pub target_column: String,
}

impl MatchingRule {
    pub fn new(
        label: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
        }
    }
}

/// `LABEL:SOURCE=TARGET` 形式（`SOURCE=TARGET` のみならラベルは SOURCE）
impl FromStr for MatchingRule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (label, columns) = match s.split_once(':') {
            Some((label, columns)) => (Some(label.trim()), columns),
            None => (None, s),
        };
        let (source, target) = columns.split_once('=').ok_or_else(|| {
            Error::Config(format!(
                "ルールの書式が不正です: {} (LABEL:SOURCE=TARGET)",
                s
            ))
        })?;
        let (source, target) = (source.trim(), target.trim());
        if source.is_empty() || target.is_empty() {
            return Err(Error::Config(format!("ルールの列名が空です: {}", s)));
        }
        let label = label.filter(|l| !l.is_empty()).unwrap_or(source);
        Ok(Self::new(label, source, target))
    }
}

/// 照合結果の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Direct,
    Semantic,
    SemanticLowConfidence,
    NoMatch,
    Error,
}

impl MatchKind {
    pub const ALL: [MatchKind; 5] = [
        MatchKind::Direct,
        MatchKind::Semantic,
        MatchKind::SemanticLowConfidence,
        MatchKind::NoMatch,
        MatchKind::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Direct => "Direct",
            MatchKind::Semantic => "Semantic",
            MatchKind::SemanticLowConfidence => "SemanticLowConfidence",
            MatchKind::NoMatch => "NoMatch",
            MatchKind::Error => "Error",
        }
    }

    /// キャッシュ対象か（エラーは一過性なので保存しない）
    pub fn is_cacheable(&self) -> bool {
        matches!(
            self,
            MatchKind::Semantic | MatchKind::SemanticLowConfidence | MatchKind::NoMatch
        )
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 1行分の照合結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchVerdict {
    #[serde(rename = "match_kind")]
    pub kind: MatchKind,
    #[serde(rename = "match_reason")]
    pub reason: String,
    #[serde(rename = "matched_target_reference", default)]
    pub matched_target_ref: Option<String>,
    #[serde(default)]
    pub confidence: Option<u8>,
}

impl MatchVerdict {
    pub fn direct(rule: &MatchingRule, value: &str, target_ref: String) -> Self {
        Self {
            kind: MatchKind::Direct,
            reason: format!(
                "Direct match on {} ({} = {}: \"{}\")",
                rule.label, rule.source_column, rule.target_column, value
            ),
            matched_target_ref: Some(target_ref),
            confidence: None,
        }
    }

    pub fn no_match(reason: impl Into<String>) -> Self {
        Self {
            kind: MatchKind::NoMatch,
            reason: non_empty(reason.into(), "No close semantic match found."),
            matched_target_ref: None,
            confidence: None,
        }
    }

    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            kind: MatchKind::Error,
            reason: non_empty(reason.into(), "unknown error"),
            matched_target_ref: None,
            confidence: None,
        }
    }
}

fn non_empty(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// 外部ドキュメントストアに登録済みのカタログ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusHandle {
    pub catalog_name: String,
    pub external_reference: String,
}

/// 出力テーブルの1行（元の列 + 照合結果）
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRow {
    pub source: Row,
    pub verdict: MatchVerdict,
}

impl AnnotatedRow {
    pub const MATCH_COLUMNS: [&'static str; 3] =
        ["match_kind", "match_reason", "matched_target_reference"];
}

impl Serialize for AnnotatedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = self.source.fields();
        let mut map = serializer.serialize_map(Some(fields.len() + 3))?;
        for (name, value) in fields {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry("match_kind", self.verdict.kind.as_str())?;
        map.serialize_entry("match_reason", &self.verdict.reason)?;
        map.serialize_entry("matched_target_reference", &self.verdict.matched_target_ref)?;
        map.end()
    }
}
