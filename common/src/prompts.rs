//! プロンプト生成モジュール
//!
//! 直接照合できなかった行1件について、意味的照合を依頼するプロンプトを組み立てる。
//! - build_inline_prompt: 候補行をプロンプトに埋め込む（テキスト応答）
//! - build_corpus_prompt: 登録済みカタログを参照させる（JSON応答）
//!
//! ルールで指定された列名はソース側・ターゲット側とも必ずそのまま出力する。

use crate::types::{CorpusHandle, Dataset, MatchingRule, Row};
use serde::{Deserialize, Serialize};

pub const MATCH_FOUND_PREFIX: &str = "Match Found:";
pub const LOW_CONFIDENCE_PREFIX: &str = "Low Match Confidence:";
pub const NO_MATCH_TEXT: &str = "No close semantic match found.";

/// テキスト応答モードのシステム指示
pub const SYSTEM_PROMPT: &str =
    "You are a meticulous product-matching assistant. You compare product records from two \
     spreadsheets and decide whether they describe the same real-world item.";

/// ルール以外にプロンプトへ含める列
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextColumns {
    #[serde(default)]
    pub source: Vec<String>,
    #[serde(default)]
    pub target: Vec<String>,
}

/// プロンプト生成オプション
#[derive(Debug, Clone, Copy)]
pub struct PromptOptions<'a> {
    pub rules: &'a [MatchingRule],
    pub context: &'a ContextColumns,
    pub target_identifier_column: Option<&'a str>,
    /// 候補行の上限（None なら全件）
    pub max_candidates: Option<usize>,
}

impl<'a> PromptOptions<'a> {
    /// ソース側で出力する列（ラベル, 列名）
    fn source_columns(&self) -> Vec<(&'a str, &'a str)> {
        let (rules, context) = (self.rules, self.context);
        let mut columns: Vec<(&str, &str)> = Vec::new();
        for rule in rules {
            push_unique(&mut columns, &rule.label, &rule.source_column);
        }
        for column in &context.source {
            push_unique(&mut columns, column, column);
        }
        columns
    }

    /// ターゲット側で出力する列（ラベル, 列名）
    fn target_columns(&self) -> Vec<(&'a str, &'a str)> {
        let (rules, context) = (self.rules, self.context);
        let mut columns: Vec<(&str, &str)> = Vec::new();
        for rule in rules {
            push_unique(&mut columns, &rule.label, &rule.target_column);
        }
        for column in &context.target {
            push_unique(&mut columns, column, column);
        }
        columns
    }
}

fn push_unique<'a>(columns: &mut Vec<(&'a str, &'a str)>, label: &'a str, column: &'a str) {
    if !columns.iter().any(|(_, c)| *c == column) {
        columns.push((label, column));
    }
}

fn render_value(row: &Row, column: &str) -> String {
    match row.get(column) {
        Some(value) if !value.is_empty() => value.to_string().trim().to_string(),
        Some(_) => "(empty)".to_string(),
        None => "(column not present)".to_string(),
    }
}

fn render_source_fields(row: &Row, options: &PromptOptions<'_>) -> String {
    options
        .source_columns()
        .iter()
        .map(|(label, column)| format!("- {} [{}]: {}", label, column, render_value(row, column)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_signifiers(options: &PromptOptions<'_>) -> String {
    if options.rules.is_empty() {
        return "- (no matching rules configured)".to_string();
    }
    options
        .rules
        .iter()
        .map(|rule| {
            format!(
                "- {}: export column \"{}\" corresponds to catalog column \"{}\"",
                rule.label, rule.source_column, rule.target_column
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// インライン照合プロンプト
///
/// # Arguments
/// * `row` - 照合対象のエクスポート行
/// * `catalog` - カタログ表
/// * `candidates` - 候補とするカタログ行の位置（排他モードで消費済みの行は除外済み）
/// * `options` - 列・識別子の設定
pub fn build_inline_prompt(
    row: &Row,
    catalog: &Dataset,
    candidates: &[usize],
    options: &PromptOptions<'_>,
) -> String {
    let target_columns = options.target_columns();
    let limit = options.max_candidates.unwrap_or(candidates.len());

    let mut candidate_lines: Vec<String> = candidates
        .iter()
        .take(limit)
        .filter_map(|&index| {
            let target = catalog.rows().get(index)?;
            let fields = target_columns
                .iter()
                .map(|(label, column)| {
                    format!("{} [{}]: {}", label, column, render_value(target, column))
                })
                .collect::<Vec<_>>()
                .join("; ");
            Some(format!(
                "[{}] {}",
                catalog.row_identifier(index, options.target_identifier_column),
                fields
            ))
        })
        .collect();

    if candidates.len() > limit {
        candidate_lines.push(format!(
            "... {} more catalog rows omitted",
            candidates.len() - limit
        ));
    }
    if candidate_lines.is_empty() {
        candidate_lines.push("(no candidate catalog rows)".to_string());
    }

    let source_fields = render_source_fields(row, options);
    let signifiers = render_signifiers(options);
    let candidates_str = candidate_lines.join("\n");

    format!(
        r#"You are an expert in funeral-home and memorial product catalogs, matching vendor export items to catalog products.
The export item below did not match any catalog row exactly. Decide which catalog row, if any, describes the same product.

## Matching signifiers
{signifiers}

## Export item
{source_fields}

## Candidate catalog rows (identifier in brackets)
{candidates_str}

## Response format
Respond with exactly one line in one of these three forms:
{MATCH_FOUND_PREFIX} [identifier] - [reason]
{NO_MATCH_TEXT}
{LOW_CONFIDENCE_PREFIX} [identifier] - [reason]

- Use the identifier exactly as shown in brackets above
- Use "{LOW_CONFIDENCE_PREFIX}" when a candidate is plausible but uncertain
- Prefer strong semantic similarity (material, color, size, product type) over loose word overlap"#
    )
}

/// 登録済みカタログ照合プロンプト（JSON応答）
pub fn build_corpus_prompt(row: &Row, corpus: &CorpusHandle, options: &PromptOptions<'_>) -> String {
    let source_fields = render_source_fields(row, options);
    let signifiers = render_signifiers(options);
    let target_columns = options
        .target_columns()
        .iter()
        .map(|(label, column)| format!("- {} [{}]", label, column))
        .collect::<Vec<_>>()
        .join("\n");
    let catalog_name = &corpus.catalog_name;

    format!(
        r#"You are an expert in funeral-home and memorial product catalogs, matching vendor export items to catalog products.
The attached file is the catalog "{catalog_name}". The export item below did not match any catalog row exactly.
Search the catalog and decide which row, if any, describes the same product.

## Matching signifiers
{signifiers}

## Catalog columns to compare
{target_columns}

## Export item
{source_fields}

## Response format
Respond with a single JSON object and nothing else:
{{"match_found": true or false, "target_index": 1-based catalog row number (header excluded) or null, "reason": "short explanation", "confidence": integer from 1 to 10}}"#
    )
}
