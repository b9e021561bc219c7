//! 照合エンジン
//!
//! ソース行を1件ずつ順に処理する:
//! 前処理（空行スキップ）→ 直接照合 → キャッシュ参照 → 意味照合 → キャッシュ保存。
//! キャッシュの書き出しはバッチ終了時に1回だけ行う。

use super::cache::CacheFile;
use super::semantic::SemanticMatcher;
use super::service::CompletionService;
use super::settings::MatchSettings;
use crate::config::PollPolicy;
use catalog_match_common::{
    build_corpus_prompt, build_inline_prompt, cache_key, corpus_catalog_identity,
    find_direct_match, inline_catalog_identity, validate_rules, AnnotatedRow, CorpusHandle,
    Dataset, MatchKind, MatchVerdict, Row, RuleSide, RuleWarning,
};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// 照合先
#[derive(Debug, Clone, Copy)]
pub enum CatalogTarget<'a> {
    /// カタログ行をプロンプトに含める
    Inline(&'a Dataset),
    /// 登録済みカタログを参照するジョブ。`catalog` があれば直接照合と識別子解決に使う
    Corpus {
        corpus: &'a CorpusHandle,
        catalog: Option<&'a Dataset>,
    },
}

impl<'a> CatalogTarget<'a> {
    fn local_catalog(&self) -> Option<&'a Dataset> {
        match *self {
            CatalogTarget::Inline(catalog) => Some(catalog),
            CatalogTarget::Corpus { catalog, .. } => catalog,
        }
    }

    /// キャッシュキーに含めるカタログ識別子
    fn identity(&self) -> String {
        match self {
            CatalogTarget::Inline(catalog) => inline_catalog_identity(catalog),
            CatalogTarget::Corpus { corpus, .. } => corpus_catalog_identity(corpus),
        }
    }
}

/// 実行サマリー
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub processed: usize,
    /// 空行・識別子なしでスキップした行
    pub skipped: usize,
    pub direct: usize,
    pub semantic: usize,
    pub low_confidence: usize,
    pub no_match: usize,
    pub errors: usize,
    pub cache_hits: usize,
    pub service_calls: usize,
    pub cache_entries_written: usize,
    /// キャッシュの書き出しに成功したか（書き出し不要なら true）
    pub cache_persisted: bool,
}

impl MatchSummary {
    fn record(&mut self, kind: MatchKind) {
        self.processed += 1;
        match kind {
            MatchKind::Direct => self.direct += 1,
            MatchKind::Semantic => self.semantic += 1,
            MatchKind::SemanticLowConfidence => self.low_confidence += 1,
            MatchKind::NoMatch => self.no_match += 1,
            MatchKind::Error => self.errors += 1,
        }
    }

    pub fn count(&self, kind: MatchKind) -> usize {
        match kind {
            MatchKind::Direct => self.direct,
            MatchKind::Semantic => self.semantic,
            MatchKind::SemanticLowConfidence => self.low_confidence,
            MatchKind::NoMatch => self.no_match,
            MatchKind::Error => self.errors,
        }
    }
}

/// 照合結果
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub rows: Vec<AnnotatedRow>,
    pub summary: MatchSummary,
    pub warnings: Vec<RuleWarning>,
}

pub struct MatchingEngine<'a, S> {
    settings: &'a MatchSettings,
    matcher: SemanticMatcher<'a, S>,
}

impl<'a, S: CompletionService> MatchingEngine<'a, S> {
    pub fn new(service: &'a S, settings: &'a MatchSettings, policy: PollPolicy) -> Self {
        Self {
            settings,
            matcher: SemanticMatcher::new(service, policy),
        }
    }

    /// ルールの列チェック（カタログが手元に無い場合はソース側のみ）
    pub fn rule_warnings(&self, source: &Dataset, target: CatalogTarget<'_>) -> Vec<RuleWarning> {
        match target.local_catalog() {
            Some(catalog) => validate_rules(&self.settings.rules, source.schema(), catalog.schema()),
            None => validate_rules(&self.settings.rules, source.schema(), source.schema())
                .into_iter()
                .filter(|w| w.side == RuleSide::Source)
                .collect(),
        }
    }

    /// ソース識別子列の存在チェック
    ///
    /// 存在しない列は行スキップに使わず、警告として返す。
    fn identifier_column<'s>(&'s self, source: &Dataset) -> (Option<&'s str>, Option<RuleWarning>) {
        match self.settings.source_identifier_column.as_deref() {
            Some(column) if !source.schema().contains(column) => (
                None,
                Some(RuleWarning {
                    rule_label: "source_identifier_column".to_string(),
                    column: column.to_string(),
                    side: RuleSide::Source,
                }),
            ),
            column => (column, None),
        }
    }

    /// 全行を照合
    ///
    /// # Arguments
    /// * `source` - エクスポート表
    /// * `target` - 照合先
    /// * `cache` - None ならキャッシュを使わない
    /// * `on_progress` - 1行処理するごとに (処理済み, 全行数) で呼ばれる
    pub async fn run<F>(
        &self,
        source: &Dataset,
        target: CatalogTarget<'_>,
        mut cache: Option<&mut CacheFile>,
        mut on_progress: F,
    ) -> MatchReport
    where
        F: FnMut(usize, usize),
    {
        let mut warnings = self.rule_warnings(source, target);
        let (source_id_column, id_warning) = self.identifier_column(source);
        warnings.extend(id_warning);
        for warning in &warnings {
            warn!("{}", warning);
        }

        let identity = target.identity();
        let options = self.settings.prompt_options();
        let target_id_column = self.settings.target_identifier_column.as_deref();
        let catalog = target.local_catalog();

        let mut summary = MatchSummary::default();
        let mut rows = Vec::with_capacity(source.len());
        let mut consumed: HashSet<usize> = HashSet::new();
        let total = source.len();

        for (index, row) in source.rows().iter().enumerate() {
            let row_id = source.row_identifier(index, source_id_column);

            if should_skip(row, source_id_column) {
                summary.skipped += 1;
                debug!(row = %row_id, "skipped blank row");
                on_progress(index + 1, total);
                continue;
            }

            // 直接照合
            let direct = catalog.and_then(|catalog| {
                find_direct_match(row, catalog, &self.settings.rules, &consumed).map(|m| {
                    (
                        m.target_index,
                        MatchVerdict::direct(
                            m.rule,
                            &m.value,
                            catalog.row_identifier(m.target_index, target_id_column),
                        ),
                    )
                })
            });

            let verdict = if let Some((target_index, verdict)) = direct {
                if !self.settings.allow_many_to_one {
                    consumed.insert(target_index);
                }
                verdict
            } else {
                let key = cache_key(row, &identity);
                let cached = cache.as_deref().and_then(|c| c.get(&key));

                match cached {
                    Some(cached) => {
                        summary.cache_hits += 1;
                        cached
                    }
                    None => {
                        summary.service_calls += 1;
                        let verdict = match target {
                            CatalogTarget::Inline(catalog) => {
                                let candidates: Vec<usize> = (0..catalog.len())
                                    .filter(|i| !consumed.contains(i))
                                    .collect();
                                let prompt = build_inline_prompt(row, catalog, &candidates, &options);
                                let known: HashSet<String> = candidates
                                    .iter()
                                    .take(options.max_candidates.unwrap_or(candidates.len()))
                                    .map(|&i| catalog.row_identifier(i, target_id_column).to_lowercase())
                                    .collect();
                                let is_known = |id: &str| known.contains(&id.trim().to_lowercase());
                                self.matcher.match_inline(&prompt, is_known).await
                            }
                            CatalogTarget::Corpus { corpus, catalog } => {
                                let prompt = build_corpus_prompt(row, corpus, &options);
                                let resolve = |n: usize| resolve_target(catalog, n, target_id_column);
                                self.matcher.match_corpus(&prompt, corpus, resolve).await
                            }
                        };

                        if let Some(cache) = cache.as_deref_mut() {
                            if cache.put(key, &verdict) {
                                summary.cache_entries_written += 1;
                            }
                        }
                        verdict
                    }
                }
            };

            debug!(
                row = %row_id,
                kind = %verdict.kind,
                target = verdict.matched_target_ref.as_deref().unwrap_or("-"),
                "row matched"
            );
            summary.record(verdict.kind);
            rows.push(AnnotatedRow {
                source: row.clone(),
                verdict,
            });
            on_progress(index + 1, total);
        }

        summary.cache_persisted = match cache {
            Some(cache) => match cache.flush() {
                Ok(()) => {
                    info!(path = %cache.path().display(), entries = cache.len(), "cache saved");
                    true
                }
                Err(e) => {
                    warn!(path = %cache.path().display(), error = %e, "cache could not be saved");
                    false
                }
            },
            None => true,
        };

        MatchReport {
            rows,
            summary,
            warnings,
        }
    }
}

/// 照合対象外の行か（全列空、または識別子列が空）
fn should_skip(row: &Row, identifier_column: Option<&str>) -> bool {
    if row.is_blank() {
        return true;
    }
    identifier_column.map_or(false, |column| row.get(column).map_or(true, |v| v.is_empty()))
}

/// 応答の1始まり行番号を識別子に変換
///
/// 手元にカタログがあれば識別子列を使い、範囲外の番号は None。
/// カタログが無ければ `#N` のまま返す。
fn resolve_target(
    catalog: Option<&Dataset>,
    number: usize,
    identifier_column: Option<&str>,
) -> Option<String> {
    match catalog {
        Some(catalog) if number >= 1 && number <= catalog.len() => {
            Some(catalog.row_identifier(number - 1, identifier_column))
        }
        Some(_) => None,
        None => Some(format!("#{}", number)),
    }
}
