//! Process-wide configuration
//!
//! Settings are assembled once at startup from built-in defaults, an optional
//! YAML file and environment overrides, validated, and then frozen in a global
//! cell. Everything after startup reads them through [`settings`].

use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::server::models::conversation::GenerationOptions;
use crate::server::services::prompt::DEFAULT_SYSTEM_PROMPT;

const CONFIG_DIR: &str = ".tutor";
const CONFIG_FILE: &str = "config.yaml";

/// API credential that never shows up in logs or printed configuration
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
  pub fn new(value: impl Into<String>) -> Self {
    Self(value.into())
  }

  pub fn expose(&self) -> &str {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Debug for Secret {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(if self.0.is_empty() { "\"\"" } else { "\"<redacted>\"" })
  }
}

impl Serialize for Secret {
  fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(if self.0.is_empty() { "" } else { "<redacted>" })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
  HuggingFace,
  Gemini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
  Pinecone,
  Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
  pub addr: SocketAddr,
}

impl Default for ServerSettings {
  fn default() -> Self {
    Self { addr: SocketAddr::from(([127, 0, 0, 1], 3000)) }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
  pub provider: EmbeddingProvider,
  pub model: String,
  pub dimension: usize,
  pub base_url: String,
  pub api_key: Secret,
  pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
  fn default() -> Self {
    Self {
      provider: EmbeddingProvider::HuggingFace,
      model: "intfloat/multilingual-e5-large".to_string(),
      dimension: 1024,
      base_url: "https://api-inference.huggingface.co".to_string(),
      api_key: Secret::default(),
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
  pub provider: StoreProvider,
  /// Data-plane host of the Pinecone index, e.g. `https://rag-index-abc123.svc.pinecone.io`
  pub index_host: String,
  pub namespace: String,
  pub api_key: Secret,
  pub upsert_batch_size: usize,
  pub timeout_secs: u64,
}

impl Default for StoreSettings {
  fn default() -> Self {
    Self {
      provider: StoreProvider::Pinecone,
      index_host: String::new(),
      namespace: "ns1".to_string(),
      api_key: Secret::default(),
      upsert_batch_size: 100,
      timeout_secs: 30,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  pub model: String,
  pub base_url: String,
  pub api_key: Secret,
  pub max_output_tokens: u32,
  pub temperature: f32,
  pub timeout_secs: u64,
  pub system_prompt: String,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      model: "gemini-1.5-flash".to_string(),
      base_url: "https://generativelanguage.googleapis.com".to_string(),
      api_key: Secret::default(),
      max_output_tokens: 1000,
      temperature: 0.1,
      timeout_secs: 120,
      system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
    }
  }
}

impl GenerationSettings {
  pub fn options(&self) -> GenerationOptions {
    GenerationOptions { max_output_tokens: self.max_output_tokens, temperature: self.temperature }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
  pub top_k: usize,
}

impl Default for RetrievalSettings {
  fn default() -> Self {
    Self { top_k: 3 }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionSettings {
  pub reviews_path: PathBuf,
}

impl Default for IngestionSettings {
  fn default() -> Self {
    Self { reviews_path: PathBuf::from("reviews.json") }
  }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub server: ServerSettings,
  pub embedding: EmbeddingSettings,
  pub store: StoreSettings,
  pub generation: GenerationSettings,
  pub retrieval: RetrievalSettings,
  pub ingestion: IngestionSettings,
}

impl Settings {
  /// Load settings from an explicit file, or the default location when it exists
  pub fn load(path: Option<&Path>) -> Result<Self> {
    let mut settings = match path {
      Some(path) => Self::from_file(path)?,
      None => match default_config_path() {
        Some(path) if path.exists() => Self::from_file(&path)?,
        _ => Self::default(),
      },
    };

    settings.apply_env_overrides(|key| std::env::var(key).ok())?;
    settings.validate()?;
    Ok(settings)
  }

  pub fn from_file(path: &Path) -> Result<Self> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file {}", path.display()))?;
    Self::from_yaml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
  }

  pub fn from_yaml(raw: &str) -> Result<Self> {
    if raw.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(raw).map_err(|e| anyhow!("Failed to parse settings: {e}"))
  }

  /// Overlay values from the environment. `lookup` is `std::env::var` in production.
  pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
  where
    F: Fn(&str) -> Option<String>,
  {
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(addr) = non_empty("TUTOR_ADDR") {
      self.server.addr =
        addr.trim().parse().with_context(|| format!("TUTOR_ADDR is not a socket address: {addr}"))?;
    }
    if let Some(path) = non_empty("TUTOR_REVIEWS_PATH") {
      self.ingestion.reviews_path = PathBuf::from(path);
    }
    if let Some(host) = non_empty("PINECONE_INDEX_HOST") {
      self.store.index_host = host;
    }
    if let Some(key) = non_empty("PINECONE_API_KEY") {
      self.store.api_key = Secret::new(key);
    }

    let gemini_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY"));
    if let Some(key) = &gemini_key {
      self.generation.api_key = Secret::new(key.clone());
    }

    let embedding_key = match self.embedding.provider {
      EmbeddingProvider::HuggingFace => non_empty("HUGGINGFACE_API_TOKEN"),
      EmbeddingProvider::Gemini => gemini_key,
    };
    if let Some(key) = embedding_key {
      self.embedding.api_key = Secret::new(key);
    }
    Ok(())
  }

  pub fn validate(&self) -> Result<()> {
    if self.embedding.dimension == 0 {
      bail!("embedding.dimension must be greater than zero");
    }
    if self.retrieval.top_k == 0 {
      bail!("retrieval.top_k must be greater than zero");
    }
    if self.store.upsert_batch_size == 0 {
      bail!("store.upsert_batch_size must be greater than zero");
    }
    if self.generation.max_output_tokens == 0 {
      bail!("generation.max_output_tokens must be greater than zero");
    }
    if !(0.0..=2.0).contains(&self.generation.temperature) {
      bail!("generation.temperature must be within [0, 2], got {}", self.generation.temperature);
    }
    if self.store.provider == StoreProvider::Pinecone && self.store.index_host.trim().is_empty() {
      bail!("store.index_host is required for the pinecone store (or set PINECONE_INDEX_HOST)");
    }
    Ok(())
  }

  /// Render as YAML; credentials are redacted by [`Secret`]
  pub fn to_redacted_yaml(&self) -> Result<String> {
    serde_yaml::to_string(self).context("Failed to render settings")
  }
}

/// `~/.tutor/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
  dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

static SETTINGS: OnceCell<Settings> = OnceCell::new();

/// Freeze the process-wide settings. Fails if called twice.
pub fn init(settings: Settings) -> Result<&'static Settings> {
  SETTINGS.set(settings).map_err(|_| anyhow!("Settings were already initialized"))?;
  settings_ref()
}

/// Read the process-wide settings
pub fn settings() -> Result<&'static Settings> {
  settings_ref()
}

fn settings_ref() -> Result<&'static Settings> {
  SETTINGS.get().ok_or_else(|| anyhow!("Settings accessed before initialization"))
}
