//! Data models shared across the kgbuilder crates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::cypher::ScriptSummary;
use crate::KgbError;

/// Source document, flattened onto a single line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where the text was read from
    pub source: PathBuf,
    /// Document text with newlines removed
    pub text: String,
}

/// How the ontology is rendered into the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OntologyFormat {
    /// Re-serialized Turtle
    Turtle,
    /// Prose description of classes, attributes and relationships
    #[default]
    NaturalLanguage,
}

impl fmt::Display for OntologyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OntologyFormat::Turtle => write!(f, "turtle"),
            OntologyFormat::NaturalLanguage => write!(f, "natural-language"),
        }
    }
}

impl FromStr for OntologyFormat {
    type Err = KgbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turtle" | "ttl" => Ok(OntologyFormat::Turtle),
            "natural-language" | "natural_language" | "nl" => Ok(OntologyFormat::NaturalLanguage),
            other => Err(KgbError::Config(format!("unknown ontology format '{other}'"))),
        }
    }
}

/// System and user instructions sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPrompt {
    /// Fixed system instruction
    pub system: String,
    /// Extraction instruction with the ontology and document spliced in
    pub user: String,
}

/// Cypher write script recovered from a model reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CypherScript {
    /// Script text
    pub text: String,
}

impl CypherScript {
    /// Wrap script text
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Individual statements, in order
    pub fn statements(&self) -> Vec<String> {
        crate::cypher::split_statements(&self.text)
    }

    /// Structural summary of the script
    pub fn summary(&self) -> ScriptSummary {
        ScriptSummary::analyze(&self.text)
    }
}

impl fmt::Display for CypherScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Result of writing a script to the graph database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Number of statements executed in the transaction
    pub statements_executed: usize,
}

/// Run timing information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timestamps {
    /// When the run started
    pub started: DateTime<Utc>,
    /// When the run ended (None if still running)
    pub ended: Option<DateTime<Utc>>,
}

/// Manifest of a single extraction run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRun {
    /// Unique run identifier
    pub run_id: String,
    /// Source document path
    pub document: PathBuf,
    /// Ontology file path
    pub ontology: PathBuf,
    /// Number of triples in the ontology
    pub ontology_triples: usize,
    /// Rendering used in the prompt
    pub ontology_format: OntologyFormat,
    /// Model identifier reported by the extraction model
    pub model: String,
    /// Recovered Cypher script
    pub script: CypherScript,
    /// Structural summary of the script
    pub summary: ScriptSummary,
    /// Database write outcome (None for dry runs)
    pub write: Option<WriteOutcome>,
    /// Run timing
    pub timestamps: Timestamps,
}

impl ExtractionRun {
    /// Generate a fresh run identifier
    pub fn new_run_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Pretty-printed JSON manifest
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| KgbError::Serialization(e.to_string()))
    }
}
