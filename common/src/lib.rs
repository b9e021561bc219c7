//! Catalog Match Common Library
//!
//! CLIと他のフロントエンドで共有される型と照合ロジック（I/Oなし）

pub mod error;
pub mod fingerprint;
pub mod parser;
pub mod prompts;
pub mod rules;
pub mod types;

pub use error::{Error, Result};
pub use fingerprint::{cache_key, corpus_catalog_identity, dataset_digest, inline_catalog_identity};
pub use parser::{
    extract_json, gate_confidence, parse_json_response, parse_text_response,
    verdict_from_json_response, verify_target, JsonVerdict,
};
pub use prompts::{build_corpus_prompt, build_inline_prompt, ContextColumns, PromptOptions};
pub use rules::{find_direct_match, validate_rules, DirectMatch, RuleSide, RuleWarning};
pub use types::{
    AnnotatedRow, CellValue, Column, ColumnKind, CorpusHandle, Dataset, MatchKind, MatchVerdict,
    MatchingRule, Row, Schema,
};
