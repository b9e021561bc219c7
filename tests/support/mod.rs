//! テスト用の補完サービス（応答を台本どおりに返す）

#![allow(dead_code)]

use catalog_match::error::{CatalogMatchError, Result};
use catalog_match::matcher::{CompletionService, RunStatus};
use catalog_match_common::prompts::NO_MATCH_TEXT;
use catalog_match_common::{CellValue, CorpusHandle, Dataset};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;

/// 1回分の応答
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Reply::Text(s.to_string())
    }
}

/// 台本どおりに応答するサービス
///
/// 台本が尽きたら即時照合は「一致なし」、ジョブは完了 + 空応答を返す。
#[derive(Default)]
pub struct ScriptedService {
    replies: RefCell<VecDeque<Reply>>,
    /// ジョブごとに返す状態列（尽きたら Completed）
    statuses: RefCell<VecDeque<RunStatus>>,
    /// true ならジョブは永遠に終わらない
    never_finish: Cell<bool>,
    pending_reply: RefCell<Option<String>>,
    pub prompts: RefCell<Vec<String>>,
    pub complete_calls: Cell<usize>,
    pub jobs_submitted: Cell<usize>,
    pub uploads: RefCell<Vec<String>>,
}

impl ScriptedService {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            ..Default::default()
        }
    }

    pub fn with_statuses(self, statuses: Vec<RunStatus>) -> Self {
        *self.statuses.borrow_mut() = statuses.into();
        self
    }

    pub fn never_finishing(self) -> Self {
        self.never_finish.set(true);
        self
    }

    /// サービスへの呼び出し回数（即時 + ジョブ）
    pub fn calls(&self) -> usize {
        self.complete_calls.get() + self.jobs_submitted.get()
    }

    fn next_reply(&self) -> Reply {
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Reply::text(NO_MATCH_TEXT))
    }
}

impl CompletionService for ScriptedService {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<String> {
        self.complete_calls.set(self.complete_calls.get() + 1);
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.next_reply() {
            Reply::Text(text) => Ok(text),
            Reply::Fail(message) => Err(CatalogMatchError::Service(message)),
        }
    }

    async fn create_thread(&self) -> Result<String> {
        Ok(format!("thread_{}", self.jobs_submitted.get() + 1))
    }

    async fn submit(&self, _thread_id: &str, prompt: &str, _corpus: &CorpusHandle) -> Result<String> {
        self.jobs_submitted.set(self.jobs_submitted.get() + 1);
        self.prompts.borrow_mut().push(prompt.to_string());
        match self.next_reply() {
            Reply::Text(text) => {
                *self.pending_reply.borrow_mut() = Some(text);
                Ok(format!("run_{}", self.jobs_submitted.get()))
            }
            Reply::Fail(message) => Err(CatalogMatchError::Service(message)),
        }
    }

    async fn run_status(&self, _thread_id: &str, _run_id: &str) -> Result<RunStatus> {
        if self.never_finish.get() {
            return Ok(RunStatus::InProgress);
        }
        Ok(self
            .statuses
            .borrow_mut()
            .pop_front()
            .unwrap_or(RunStatus::Completed))
    }

    async fn first_reply(&self, _thread_id: &str) -> Result<Option<String>> {
        Ok(self.pending_reply.borrow_mut().take())
    }

    async fn upload_file(&self, path: &Path) -> Result<String> {
        self.uploads.borrow_mut().push(path.display().to_string());
        Ok(format!("file-{}", self.uploads.borrow().len()))
    }
}

/// 文字列の表からデータセットを作る
pub fn dataset(name: &str, headers: &[&str], rows: &[&[&str]]) -> Dataset {
    Dataset::from_records(
        name,
        headers.iter().map(|h| h.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|v| CellValue::from_text(v)).collect())
            .collect(),
    )
    .expect("test dataset must be valid")
}
