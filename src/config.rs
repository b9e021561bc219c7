use crate::error::{CatalogMatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// 利用者設定（~/.config/catalog-match/config.json）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// 登録済みカタログ照合で使うアシスタントID
    pub assistant_id: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    /// ジョブ状態のポーリング間隔
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub poll_deadline_seconds: u64,
    pub cache_path: PathBuf,
    pub registry_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            assistant_id: None,
            temperature: 0.2,
            max_tokens: 300,
            timeout_seconds: 60,
            poll_interval_ms: 1000,
            max_poll_attempts: 120,
            poll_deadline_seconds: 300,
            cache_path: PathBuf::from(".catalog-match-cache.json"),
            registry_path: PathBuf::from("catalog_files.json"),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CatalogMatchError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("catalog-match").join("config.json"))
    }

    pub fn get_api_key(&self) -> Result<String> {
        // 環境変数を優先
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                return Ok(key);
            }
        }

        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(CatalogMatchError::MissingApiKey)
    }

    pub fn set_api_key(&mut self, key: String) -> Result<()> {
        self.api_key = Some(key);
        self.save()
    }

    /// HTTPクライアントに渡す接続設定を解決（APIキー必須）
    pub fn service_config(&self) -> Result<ServiceConfig> {
        let api_key = self.get_api_key()?;
        Ok(ServiceConfig {
            api_key: Some(api_key),
            ..self.service_config_optional_key()
        })
    }

    /// APIキー未設定でも接続設定を作る
    ///
    /// キーが無いクライアントはサービス呼び出しのたびに MissingApiKey を返す。
    pub fn service_config_optional_key(&self) -> ServiceConfig {
        ServiceConfig {
            api_key: self.get_api_key().ok(),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            model: self.model.clone(),
            assistant_id: self.assistant_id.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout: Duration::from_secs(self.timeout_seconds),
        }
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts.max(1),
            deadline: Duration::from_secs(self.poll_deadline_seconds),
        }
    }
}

/// 補完サービスの接続設定（構築時にクライアントへ渡す）
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// None なら直接照合のみ（サービス呼び出しは失敗扱い）
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub assistant_id: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// ジョブ状態ポーリングの上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Config::default().poll_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_poll_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 120);
        assert_eq!(policy.deadline, Duration::from_secs(300));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"model": "gpt-4o"}"#).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.registry_path, PathBuf::from("catalog_files.json"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let config = Config::load_from(Path::new("/nonexistent/catalog-match.json")).unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_zero_attempts_is_raised_to_one() {
        let config = Config {
            max_poll_attempts: 0,
            ..Config::default()
        };
        assert_eq!(config.poll_policy().max_attempts, 1);
    }
}
