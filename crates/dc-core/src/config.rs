//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. docchat.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Error;

/// Default config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "docchat.toml";

/// Gemini API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key
    pub api_key: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL (optional, for custom endpoints)
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

/// Persistence backend type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key
    #[default]
    File,
    /// Key-value table in a SQLite database
    Sqlite,
}

impl StorageBackend {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "sqlite" | "db" => StorageBackend::Sqlite,
            _ => StorageBackend::File,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend used for the session list
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory holding the data files
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Storage key for the session list
    #[serde(default = "default_sessions_key")]
    pub sessions_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
            sessions_key: default_sessions_key(),
        }
    }
}

impl StorageConfig {
    /// Path of the SQLite database when the sqlite backend is selected
    pub fn db_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join("docchat.db")
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_sessions_key() -> String {
    "geminiChatSessions".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Seconds between file status checks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Status checks before giving up on a file that is still processing
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_attempts: default_max_poll_attempts(),
        }
    }
}

impl UploadConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_max_poll_attempts() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Title used when no title can be derived from an attached document
    #[serde(default = "default_title")]
    pub default_title: String,

    /// Text shown in place of a reply when the API call fails
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_title: default_title(),
            error_message: default_error_message(),
        }
    }
}

fn default_title() -> String {
    "New chat".to_string()
}

fn default_error_message() -> String {
    "❌ Error while contacting the API".to_string()
}

/// Main configuration for docchat
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub chat: ChatConfig,
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 設定ファイルから設定を読み込む
    ///
    /// 設定ファイル内の `${VAR_NAME}` は環境変数の値に置換されます。
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&toml_content)?;

        // 既存の環境変数で上書き（環境変数が優先）
        cfg.apply_env_overrides();

        Ok(cfg)
    }

    /// Parse a TOML document (after `${VAR}` expansion) without env overrides
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded_content = Self::expand_env_vars(content);

        let config: TomlConfig = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        Ok(Self::from_toml_config(config))
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// 1. 引数で指定されたパス
    /// 2. `./docchat.toml`
    /// 3. 見つからない場合は環境変数のみ
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        if let Some(path) = path {
            return Self::from_toml_file(path);
        }

        if Path::new(CONFIG_FILE_NAME).exists() {
            return Self::from_toml_file(CONFIG_FILE_NAME);
        }

        Self::from_env()
    }

    /// TOML 構造から Config を構築
    fn from_toml_config(toml: TomlConfig) -> Self {
        let llm = toml.llm.unwrap_or_default();
        let llm_config = LlmConfig {
            api_key: llm.api_key.unwrap_or_default(),
            model: llm.model.unwrap_or_else(default_model),
            base_url: llm.base_url,
        };

        let storage = toml.storage.unwrap_or_default();
        let storage_config = StorageConfig {
            backend: storage
                .backend
                .as_deref()
                .map(StorageBackend::parse)
                .unwrap_or_default(),
            data_dir: storage.data_dir.unwrap_or_else(default_data_dir),
            sessions_key: storage.sessions_key.unwrap_or_else(default_sessions_key),
        };

        let upload = toml.upload.unwrap_or_default();
        let upload_config = UploadConfig {
            poll_interval_secs: upload
                .poll_interval_secs
                .unwrap_or_else(default_poll_interval_secs),
            max_poll_attempts: upload
                .max_poll_attempts
                .unwrap_or_else(default_max_poll_attempts),
        };

        let chat = toml.chat.unwrap_or_default();
        let chat_config = ChatConfig {
            default_title: chat.default_title.unwrap_or_else(default_title),
            error_message: chat.error_message.unwrap_or_else(default_error_message),
        };

        Config {
            llm: llm_config,
            storage: storage_config,
            upload: upload_config,
            chat: chat_config,
        }
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            if !api_key.is_empty() {
                self.llm.api_key = api_key;
            }
        }

        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }

        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            if !base_url.is_empty() {
                self.llm.base_url = Some(base_url);
            }
        }

        if let Ok(backend) = std::env::var("DOCCHAT_STORAGE") {
            if !backend.is_empty() {
                self.storage.backend = StorageBackend::parse(&backend);
            }
        }

        if let Ok(dir) = std::env::var("DOCCHAT_DATA_DIR") {
            if !dir.is_empty() {
                self.storage.data_dir = dir;
            }
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| Error::Config("GEMINI_API_KEY not set".to_string()))?;

        let mut cfg = Config {
            llm: LlmConfig {
                api_key,
                ..LlmConfig::default()
            },
            ..Config::default()
        };
        cfg.apply_env_overrides();

        Ok(cfg)
    }
}

// ============================================================================
// TOML 構造体定義（ファイル解析用）
// ============================================================================

/// TOML ファイル用のトップレベル構造
#[derive(Debug, Deserialize)]
struct TomlConfig {
    llm: Option<TomlLlmConfig>,
    storage: Option<TomlStorageConfig>,
    upload: Option<TomlUploadConfig>,
    chat: Option<TomlChatConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlLlmConfig {
    /// モデル名
    #[serde(default)]
    model: Option<String>,
    /// API キー
    #[serde(default)]
    api_key: Option<String>,
    /// ベース URL (オプション)
    #[serde(default)]
    base_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlStorageConfig {
    /// "file" または "sqlite"
    backend: Option<String>,
    data_dir: Option<String>,
    sessions_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlUploadConfig {
    poll_interval_secs: Option<u64>,
    max_poll_attempts: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlChatConfig {
    default_title: Option<String>,
    error_message: Option<String>,
}
