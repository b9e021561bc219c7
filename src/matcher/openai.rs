//! OpenAI 互換 HTTP クライアント
//!
//! - チャット補完: `POST /chat/completions`
//! - ファイル登録: `POST /files`（purpose = assistants）
//! - 登録済みカタログ照合: threads / messages / runs（Assistants v2）

use super::service::{CompletionService, RunStatus};
use crate::config::ServiceConfig;
use crate::error::{CatalogMatchError, Result};
use catalog_match_common::CorpusHandle;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use tracing::debug;

const ASSISTANTS_BETA: &str = "assistants=v2";

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct RunResponse {
    status: String,
    #[serde(default)]
    last_error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<MessageContent>,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    text: Option<MessageText>,
}

#[derive(Deserialize)]
struct MessageText {
    value: String,
}

/// OpenAI 互換サービスクライアント
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    config: ServiceConfig,
}

impl OpenAiClient {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| CatalogMatchError::Config(format!("APIキーが不正です: {}", e)))?;
            headers.insert(AUTHORIZATION, bearer);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    fn require_key(&self) -> Result<()> {
        match self.config.api_key {
            Some(_) => Ok(()),
            None => Err(CatalogMatchError::MissingApiKey),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    fn assistants(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    /// 失敗ステータスをエラーメッセージ付きで Service エラーにする
    async fn check(response: Response, action: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .map(|body| body.error.message)
            .unwrap_or_else(|_| "unknown error".to_string());
        Err(CatalogMatchError::Service(format!(
            "{} failed ({}): {}",
            action, status, message
        )))
    }

    fn assistant_id(&self) -> Result<&str> {
        self.config.assistant_id.as_deref().ok_or_else(|| {
            CatalogMatchError::Config(
                "assistant_id が設定されていません（登録済みカタログ照合に必要）".into(),
            )
        })
    }
}

impl CompletionService for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        self.require_key()?;
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: prompt },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.url("chat/completions"))
            .json(&request)
            .send()
            .await?;
        let body: ChatResponse = Self::check(response, "chat completion")
            .await?
            .json()
            .await
            .map_err(|e| CatalogMatchError::Parse(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        debug!(chars = content.len(), "chat completion received");
        Ok(content)
    }

    async fn create_thread(&self) -> Result<String> {
        self.require_key()?;
        let response = self
            .assistants(self.client.post(self.url("threads")))
            .json(&json!({}))
            .send()
            .await?;
        let body: IdResponse = Self::check(response, "create thread").await?.json().await?;
        Ok(body.id)
    }

    async fn submit(&self, thread_id: &str, prompt: &str, corpus: &CorpusHandle) -> Result<String> {
        self.require_key()?;
        let assistant_id = self.assistant_id()?;

        let message = json!({
            "role": "user",
            "content": prompt,
            "attachments": [{
                "file_id": corpus.external_reference,
                "tools": [{"type": "file_search"}]
            }]
        });
        let response = self
            .assistants(self.client.post(self.url(&format!("threads/{}/messages", thread_id))))
            .json(&message)
            .send()
            .await?;
        Self::check(response, "add message").await?;

        let response = self
            .assistants(self.client.post(self.url(&format!("threads/{}/runs", thread_id))))
            .json(&json!({ "assistant_id": assistant_id }))
            .send()
            .await?;
        let body: IdResponse = Self::check(response, "create run").await?.json().await?;
        debug!(thread = thread_id, run = %body.id, "run submitted");
        Ok(body.id)
    }

    async fn run_status(&self, thread_id: &str, run_id: &str) -> Result<RunStatus> {
        self.require_key()?;
        let response = self
            .assistants(
                self.client
                    .get(self.url(&format!("threads/{}/runs/{}", thread_id, run_id))),
            )
            .send()
            .await?;
        let body: RunResponse = Self::check(response, "retrieve run").await?.json().await?;
        Ok(RunStatus::from_api(
            &body.status,
            body.last_error.as_ref().map(|e| e.message.as_str()),
        ))
    }

    async fn first_reply(&self, thread_id: &str) -> Result<Option<String>> {
        self.require_key()?;
        let response = self
            .assistants(
                self.client
                    .get(self.url(&format!("threads/{}/messages", thread_id)))
                    .query(&[("order", "asc")]),
            )
            .send()
            .await?;
        let body: MessageList = Self::check(response, "list messages").await?.json().await?;

        Ok(body
            .data
            .into_iter()
            .filter(|m| m.role == "assistant")
            .find_map(|m| m.content.into_iter().find_map(|c| c.text).map(|t| t.value)))
    }

    async fn upload_file(&self, path: &Path) -> Result<String> {
        self.require_key()?;
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "catalog".to_string());

        let form = reqwest::multipart::Form::new()
            .text("purpose", "assistants")
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.url("files"))
            .multipart(form)
            .send()
            .await?;
        let body: IdResponse = Self::check(response, "file upload").await?.json().await?;
        Ok(body.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_list_picks_assistant_text() {
        let list: MessageList = serde_json::from_str(
            r#"{"data": [
                {"role": "user", "content": [{"type": "text", "text": {"value": "prompt"}}]},
                {"role": "assistant", "content": [{"type": "text", "text": {"value": "{\"match_found\": false, \"confidence\": 2}"}}]}
            ]}"#,
        )
        .unwrap();
        let reply = list
            .data
            .into_iter()
            .filter(|m| m.role == "assistant")
            .find_map(|m| m.content.into_iter().find_map(|c| c.text).map(|t| t.value));
        assert!(reply.unwrap().contains("match_found"));
    }

    #[test]
    fn test_run_response_with_last_error() {
        let run: RunResponse = serde_json::from_str(
            r#"{"id": "run_1", "status": "failed", "last_error": {"code": "server_error", "message": "boom"}}"#,
        )
        .unwrap();
        let status = RunStatus::from_api(&run.status, run.last_error.as_ref().map(|e| e.message.as_str()));
        assert_eq!(status, RunStatus::Failed("failed: boom".into()));
    }

    fn local_config(api_key: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            api_key: api_key.map(String::from),
            base_url: "http://localhost:9".into(),
            model: "gpt-4o-mini".into(),
            assistant_id: None,
            temperature: 0.0,
            max_tokens: 10,
            timeout: std::time::Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_calls_without_api_key_fail_before_request() {
        let client = OpenAiClient::new(local_config(None)).unwrap();
        let err = client.complete("system", "prompt").await.unwrap_err();
        assert!(matches!(err, CatalogMatchError::MissingApiKey));
        let err = client.create_thread().await.unwrap_err();
        assert!(matches!(err, CatalogMatchError::MissingApiKey));
    }

    #[test]
    fn test_assistant_id_required_for_corpus() {
        let client = OpenAiClient::new(ServiceConfig {
            api_key: Some("sk-test".into()),
            base_url: "http://localhost:9".into(),
            model: "gpt-4o-mini".into(),
            assistant_id: None,
            temperature: 0.0,
            max_tokens: 10,
            timeout: std::time::Duration::from_secs(1),
        })
        .unwrap();
        assert!(matches!(client.assistant_id(), Err(CatalogMatchError::Config(_))));
    }
}
