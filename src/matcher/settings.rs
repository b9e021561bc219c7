//! 照合設定（ルール・識別子列・コンテキスト列）
//!
//! JSONファイル（`--settings`）から読み込み、CLI引数で上書きする。

use crate::error::{CatalogMatchError, Result};
use catalog_match_common::{ContextColumns, MatchingRule, PromptOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_allow_many_to_one() -> bool {
    true
}

/// 照合設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSettings {
    #[serde(default)]
    pub rules: Vec<MatchingRule>,
    /// この列が空のソース行は照合しない
    #[serde(default)]
    pub source_identifier_column: Option<String>,
    /// 結果に書き出すターゲット行の識別子列（なければ `#行番号`）
    #[serde(default)]
    pub target_identifier_column: Option<String>,
    #[serde(default)]
    pub context_columns: ContextColumns,
    /// false なら1つのカタログ行は1つのソース行にしか直接一致しない
    #[serde(default = "default_allow_many_to_one")]
    pub allow_many_to_one: bool,
    /// プロンプトに載せるカタログ行の上限
    #[serde(default)]
    pub max_candidates: Option<usize>,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            source_identifier_column: None,
            target_identifier_column: None,
            context_columns: ContextColumns::default(),
            allow_many_to_one: true,
            max_candidates: None,
        }
    }
}

/// CLI から与えられる上書き値
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub rules: Vec<String>,
    pub source_identifier_column: Option<String>,
    pub target_identifier_column: Option<String>,
    pub exclusive: bool,
    pub max_candidates: Option<usize>,
}

impl MatchSettings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CatalogMatchError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let settings: MatchSettings = serde_json::from_str(&content)
            .map_err(|e| CatalogMatchError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(settings)
    }

    /// CLI 指定を反映（ルールが指定されればファイルのルールを置き換える）
    pub fn apply_overrides(mut self, overrides: SettingsOverrides) -> Result<Self> {
        if !overrides.rules.is_empty() {
            self.rules = overrides
                .rules
                .iter()
                .map(|r| r.parse::<MatchingRule>())
                .collect::<std::result::Result<Vec<_>, _>>()?;
        }
        if overrides.source_identifier_column.is_some() {
            self.source_identifier_column = overrides.source_identifier_column;
        }
        if overrides.target_identifier_column.is_some() {
            self.target_identifier_column = overrides.target_identifier_column;
        }
        if overrides.exclusive {
            self.allow_many_to_one = false;
        }
        if overrides.max_candidates.is_some() {
            self.max_candidates = overrides.max_candidates;
        }
        Ok(self)
    }

    pub fn prompt_options(&self) -> PromptOptions<'_> {
        PromptOptions {
            rules: &self.rules,
            context: &self.context_columns,
            target_identifier_column: self.target_identifier_column.as_deref(),
            max_candidates: self.max_candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_json_defaults() {
        let settings: MatchSettings = serde_json::from_str(
            r#"{"rules": [{"label": "SKU", "source_column": "sku", "target_column": "item_no"}]}"#,
        )
        .unwrap();
        assert_eq!(settings.rules.len(), 1);
        assert!(settings.allow_many_to_one);
        assert!(settings.context_columns.source.is_empty());
    }

    #[test]
    fn test_overrides_replace_rules() {
        let settings = MatchSettings {
            rules: vec![MatchingRule::new("Old", "a", "b")],
            ..Default::default()
        };
        let overrides = SettingsOverrides {
            rules: vec!["SKU:sku=item_no".into(), "title=name".into()],
            exclusive: true,
            ..Default::default()
        };

        let merged = settings.apply_overrides(overrides).unwrap();
        assert_eq!(merged.rules[0], MatchingRule::new("SKU", "sku", "item_no"));
        assert_eq!(merged.rules[1].label, "title");
        assert!(!merged.allow_many_to_one);
    }

    #[test]
    fn test_bad_rule_override_is_error() {
        let overrides = SettingsOverrides {
            rules: vec!["no-equals-sign".into()],
            ..Default::default()
        };
        assert!(MatchSettings::default().apply_overrides(overrides).is_err());
    }
}
