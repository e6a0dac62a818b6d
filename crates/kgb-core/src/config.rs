//! Layered configuration
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file, and environment variables. Command-line flags are applied on top by
//! the binary.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::models::OntologyFormat;
use crate::{KgbError, Result};

/// Environment variable overriding the chat completions base URL
pub const ENV_LLM_BASE_URL: &str = "KGB_LLM_BASE_URL";
/// Environment variable overriding the model identifier
pub const ENV_LLM_MODEL: &str = "KGB_LLM_MODEL";
/// Environment variable overriding the request timeout
pub const ENV_LLM_TIMEOUT: &str = "KGB_OPENAI_TIMEOUT_SECONDS";
/// Environment variable holding the API key
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable overriding the Bolt URI
pub const ENV_NEO4J_URI: &str = "NEO4J_URI";
/// Environment variable overriding the database user
pub const ENV_NEO4J_USER: &str = "NEO4J_USER";
/// Environment variable holding the database password
pub const ENV_NEO4J_PASSWORD: &str = "NEO4J_PASSWORD";
/// Environment variable selecting the database
pub const ENV_NEO4J_DATABASE: &str = "NEO4J_DATABASE";

const BOLT_SCHEMES: &[&str] = &["bolt", "bolt+s", "bolt+ssc", "neo4j", "neo4j+s", "neo4j+ssc"];

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KgbConfig {
    /// Completion endpoint settings
    pub llm: LlmSettings,
    /// Graph database settings
    pub neo4j: Neo4jSettings,
    /// Ontology settings
    pub ontology: OntologySettings,
}

/// Completion endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Base URL of an OpenAI-compatible API
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Sampling temperature, provider default when unset
    pub temperature: Option<f32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            timeout_seconds: 120,
            temperature: None,
        }
    }
}

/// Graph database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Neo4jSettings {
    /// Bolt URI
    pub uri: String,
    /// User name
    pub user: String,
    /// Password; prefer the environment over the config file
    #[serde(skip_serializing)]
    pub password: Option<SecretString>,
    /// Database name, server default when unset
    pub database: Option<String>,
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: None,
            database: None,
        }
    }
}

/// Ontology settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologySettings {
    /// Turtle file to load when none is given on the command line
    pub path: Option<PathBuf>,
    /// Rendering used in the prompt
    pub format: OntologyFormat,
    /// Base IRI for resolving relative IRIs
    pub base_iri: Option<String>,
}

impl KgbConfig {
    /// Default config file location (`<config dir>/kgbuilder/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("kgbuilder").join("config.toml"))
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| KgbError::Config(e.to_string()))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one the default location is used
    /// if present. Environment overrides are applied last. The result is not
    /// validated, so that command-line flags can still replace bad values;
    /// call [`KgbConfig::validate`] once they are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(default) => Self::read_file(&default)?,
                None => Self::default(),
            },
        };

        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => KgbError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => KgbError::Io(e),
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = lookup(ENV_LLM_BASE_URL) {
            self.llm.base_url = v;
        }
        if let Some(v) = lookup(ENV_LLM_MODEL) {
            self.llm.model = v;
        }
        if let Some(v) = lookup(ENV_LLM_TIMEOUT) {
            self.llm.timeout_seconds = v
                .trim()
                .parse()
                .map_err(|_| KgbError::Config(format!("{ENV_LLM_TIMEOUT} must be a number, got '{v}'")))?;
        }
        if let Some(v) = lookup(ENV_NEO4J_URI) {
            self.neo4j.uri = v;
        }
        if let Some(v) = lookup(ENV_NEO4J_USER) {
            self.neo4j.user = v;
        }
        if let Some(v) = lookup(ENV_NEO4J_PASSWORD) {
            self.neo4j.password = Some(SecretString::from(v));
        }
        if let Some(v) = lookup(ENV_NEO4J_DATABASE) {
            self.neo4j.database = Some(v);
        }

        Ok(())
    }

    /// Check values that would otherwise fail late
    pub fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            return Err(KgbError::Config("llm.model must not be empty".to_string()));
        }
        if let Some(t) = self.llm.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(KgbError::Config(format!(
                    "llm.temperature must be between 0.0 and 2.0, got {t}"
                )));
            }
        }

        let scheme = self.neo4j.uri.split("://").next().unwrap_or_default();
        if !self.neo4j.uri.contains("://") || !BOLT_SCHEMES.contains(&scheme) {
            return Err(KgbError::Config(format!(
                "neo4j.uri must use one of {}, got '{}'",
                BOLT_SCHEMES.join(", "),
                self.neo4j.uri
            )));
        }

        Ok(())
    }
}
