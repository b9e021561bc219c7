//! 直接照合ルールの評価
//!
//! ソース行1件に対し、ターゲット表を先頭から走査して
//! いずれかのルールを満たす最初の行を返す。副作用なし。

use crate::types::{Dataset, MatchingRule, Row, Schema};
use std::collections::HashSet;
use std::fmt;

/// 直接一致の結果
#[derive(Debug, Clone, PartialEq)]
pub struct DirectMatch<'a> {
    /// ターゲット表での行位置（0始まり）
    pub target_index: usize,
    pub target_row: &'a Row,
    pub rule: &'a MatchingRule,
    /// 一致した値（ソース側の元の表記）
    pub value: String,
}

/// ルールが存在しない列を参照している
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleWarning {
    pub rule_label: String,
    pub column: String,
    pub side: RuleSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSide {
    Source,
    Target,
}

impl fmt::Display for RuleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            RuleSide::Source => "ソース",
            RuleSide::Target => "ターゲット",
        };
        write!(
            f,
            "ルール「{}」: {}列「{}」が存在しないためスキップします",
            self.rule_label, side, self.column
        )
    }
}

/// ルールが参照する列の存在チェック
pub fn validate_rules(
    rules: &[MatchingRule],
    source: &Schema,
    target: &Schema,
) -> Vec<RuleWarning> {
    let mut warnings = Vec::new();
    for rule in rules {
        if !source.contains(&rule.source_column) {
            warnings.push(RuleWarning {
                rule_label: rule.label.clone(),
                column: rule.source_column.clone(),
                side: RuleSide::Source,
            });
        }
        if !target.contains(&rule.target_column) {
            warnings.push(RuleWarning {
                rule_label: rule.label.clone(),
                column: rule.target_column.clone(),
                side: RuleSide::Target,
            });
        }
    }
    warnings
}

/// 単一ルールでの一致判定
///
/// 列が無い、または値が空の場合は不一致
fn rule_matches(rule: &MatchingRule, source: &Row, target: &Row) -> Option<String> {
    let source_value = source.get(&rule.source_column).filter(|v| !v.is_empty())?;
    let target_value = target.get(&rule.target_column).filter(|v| !v.is_empty())?;

    if source_value.normalized() == target_value.normalized() {
        Some(source_value.to_string().trim().to_string())
    } else {
        None
    }
}

/// 直接一致を探す
///
/// ターゲット行を表の順に走査し、いずれかのルールを満たす最初の行を返す。
/// 同じ行で複数ルールが成立する場合はルールリストで先のものを採用する。
/// `consumed` に含まれる行位置はスキップする（排他モード用）。
pub fn find_direct_match<'a>(
    source: &Row,
    target: &'a Dataset,
    rules: &'a [MatchingRule],
    consumed: &HashSet<usize>,
) -> Option<DirectMatch<'a>> {
    if rules.is_empty() {
        return None;
    }

    target
        .rows()
        .iter()
        .enumerate()
        .filter(|(index, _)| !consumed.contains(index))
        .find_map(|(index, target_row)| {
            rules.iter().find_map(|rule| {
                rule_matches(rule, source, target_row).map(|value| DirectMatch {
                    target_index: index,
                    target_row,
                    rule,
                    value,
                })
            })
        })
}
