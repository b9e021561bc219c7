//! 意味照合（補完サービス呼び出し + 応答パース）
//!
//! サービス側の失敗・タイムアウトはすべて `MatchKind::Error` の結果に変換し、
//! バッチ全体は止めない。

use super::service::{CompletionService, RunStatus};
use crate::config::PollPolicy;
use crate::error::{CatalogMatchError, Result};
use catalog_match_common::prompts::SYSTEM_PROMPT;
use catalog_match_common::{
    parse_text_response, verdict_from_json_response, verify_target, CorpusHandle, MatchVerdict,
};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

pub struct SemanticMatcher<'a, S> {
    service: &'a S,
    policy: PollPolicy,
}

impl<'a, S: CompletionService> SemanticMatcher<'a, S> {
    pub fn new(service: &'a S, policy: PollPolicy) -> Self {
        Self { service, policy }
    }

    /// 候補行をプロンプトに含めて即時照合
    ///
    /// `is_known` はプロンプトに載せた候補の識別子か判定する。候補外の識別子は NoMatch。
    pub async fn match_inline(&self, prompt: &str, is_known: impl Fn(&str) -> bool) -> MatchVerdict {
        match self.service.complete(SYSTEM_PROMPT, prompt).await {
            Ok(response) => verify_target(parse_text_response(&response), &response, is_known),
            Err(e) => {
                warn!(error = %e, "inline semantic match failed");
                MatchVerdict::error(e.to_string())
            }
        }
    }

    /// 登録済みカタログを参照するジョブで照合
    ///
    /// `resolve` は応答の1始まり行番号をターゲット識別子に変換する（範囲外は None）。
    pub async fn match_corpus(
        &self,
        prompt: &str,
        corpus: &CorpusHandle,
        resolve: impl Fn(usize) -> Option<String>,
    ) -> MatchVerdict {
        match self.run_job(prompt, corpus).await {
            Ok(response) => verdict_from_json_response(&response, resolve),
            Err(e) => {
                warn!(error = %e, catalog = %corpus.catalog_name, "corpus semantic match failed");
                MatchVerdict::error(e.to_string())
            }
        }
    }

    async fn run_job(&self, prompt: &str, corpus: &CorpusHandle) -> Result<String> {
        let thread_id = self.service.create_thread().await?;
        let run_id = self.service.submit(&thread_id, prompt, corpus).await?;
        self.await_run(&thread_id, &run_id).await?;

        self.service
            .first_reply(&thread_id)
            .await?
            .ok_or_else(|| CatalogMatchError::Service(format!("run {} produced no reply", run_id)))
    }

    /// 終了状態まで待つ（回数上限と期限の早い方で打ち切り）
    async fn await_run(&self, thread_id: &str, run_id: &str) -> Result<()> {
        let started = Instant::now();

        for attempt in 1..=self.policy.max_attempts {
            let status = self.service.run_status(thread_id, run_id).await?;
            if status.is_terminal() {
                return match status {
                    RunStatus::Failed(reason) => Err(CatalogMatchError::Service(format!(
                        "run {} ended: {}",
                        run_id, reason
                    ))),
                    _ => {
                        debug!(run = run_id, attempt, "run completed");
                        Ok(())
                    }
                };
            }

            if started.elapsed() >= self.policy.deadline {
                return Err(CatalogMatchError::Timeout(format!(
                    "run {} still pending after {:?}",
                    run_id, self.policy.deadline
                )));
            }
            if attempt < self.policy.max_attempts {
                sleep(self.policy.interval).await;
            }
        }

        Err(CatalogMatchError::Timeout(format!(
            "run {} still pending after {} polls",
            run_id, self.policy.max_attempts
        )))
    }
}
