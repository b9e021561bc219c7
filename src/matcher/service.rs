//! 補完サービスの抽象
//!
//! 即時応答（チャット補完）と、登録済みファイルを参照する非同期ジョブ
//! （スレッド + 実行 + ポーリング）の2系統を持つ。テストではスクリプト化した
//! 実装に差し替える。

use crate::error::Result;
use catalog_match_common::CorpusHandle;
use std::path::Path;

/// 非同期ジョブの状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    /// failed / cancelled / expired / incomplete（理由付き）
    Failed(String),
}

impl RunStatus {
    /// サービスの状態文字列から変換
    pub fn from_api(status: &str, last_error: Option<&str>) -> Self {
        match status {
            "queued" => RunStatus::Queued,
            "in_progress" | "cancelling" | "requires_action" => RunStatus::InProgress,
            "completed" => RunStatus::Completed,
            other => RunStatus::Failed(match last_error {
                Some(message) if !message.trim().is_empty() => format!("{}: {}", other, message),
                _ => other.to_string(),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed(_))
    }
}

/// 補完サービス
#[allow(async_fn_in_trait)]
pub trait CompletionService {
    /// 即時応答
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    /// 会話スレッドを作成してIDを返す
    async fn create_thread(&self) -> Result<String>;

    /// 登録済みカタログを添付してメッセージを送り、実行IDを返す
    async fn submit(&self, thread_id: &str, prompt: &str, corpus: &CorpusHandle) -> Result<String>;

    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<RunStatus>;

    /// スレッド上の最初のアシスタント応答
    async fn first_reply(&self, thread_id: &str) -> Result<Option<String>>;

    /// ファイルを登録して外部参照IDを返す
    async fn upload_file(&self, path: &Path) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_from_api() {
        assert_eq!(RunStatus::from_api("queued", None), RunStatus::Queued);
        assert_eq!(RunStatus::from_api("in_progress", None), RunStatus::InProgress);
        assert_eq!(RunStatus::from_api("completed", None), RunStatus::Completed);
        assert_eq!(
            RunStatus::from_api("failed", Some("rate limited")),
            RunStatus::Failed("failed: rate limited".into())
        );
        assert_eq!(
            RunStatus::from_api("expired", None),
            RunStatus::Failed("expired".into())
        );
        assert!(RunStatus::from_api("cancelled", None).is_terminal());
        assert!(!RunStatus::Queued.is_terminal());
    }
}
