use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::domain::services::huggingface_embedding::EmbeddingsModel;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub qdrant: QdrantSettings,
    pub embeddings: EmbeddingsSettings,
    pub chat_model: ChatModelSettings,
    pub agent: AgentSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantSettings {
    /// gRPC endpoint, ex: `http://localhost:6334`
    pub endpoint: String,
    /// Empty for a local instance without authentication
    pub api_key: Secret<String>,
    pub candidates_collection: String,
    pub companies_collection: String,
    /// Name of a Qdrant `Distance`: `Cosine`, `Euclid` or `Dot`
    pub collection_distance: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub collection_vector_size: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub search_limit: u64,
}

impl QdrantSettings {
    pub fn api_key(&self) -> Option<String> {
        let api_key = self.api_key.expose_secret();
        if api_key.is_empty() {
            None
        } else {
            Some(api_key.to_string())
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingsSettings {
    pub model: EmbeddingsModel,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatModelSettings {
    /// OpenAI-compatible API base, ex: `https://api.openai.com/v1`
    pub base_url: String,
    pub api_key: Secret<String>,
    pub model: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentSettings {
    /// Maximum number of model/tools steps for a single chat turn
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub recursion_limit: usize,
}

/// Extracts app settings from configuration files and env variables
///
/// `base.yaml` should contain shared settings for all environments.
/// A specific env file should be created for each environment: `local.yaml` and `production.yaml`
/// The environment is set with the env var `APP_ENVIRONMENT`.
/// If `APP_ENVIRONMENT` is not set, `local.yaml` is the default.
///
/// Settings are also taken from environment variables: with a prefix of APP and '__' as separator
/// For ex: `APP_CHAT_MODEL__API_KEY=sk-... would set `Settings.chat_model.api_key`
pub fn get_configuration() -> Result<Settings, ConfigurationError> {
    let base_path = std::env::current_dir()?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(ConfigurationError::InvalidEnvironment)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(environment_filename),
        ))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    Ok(settings.try_deserialize::<Settings>()?)
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to determine the current directory: {0}")]
    CurrentDirectory(#[from] std::io::Error),
    #[error("Failed to parse APP_ENVIRONMENT: {0}")]
    InvalidEnvironment(String),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

/// The possible runtime environment for our application.
#[derive(Debug)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}
