//! kgbuilder core - ontology-constrained knowledge graph extraction
//!
//! This crate holds everything that does not talk to a remote service:
//! loading the source document, parsing and rendering the ontology, building
//! the extraction prompt, recovering the Cypher script from a model reply and
//! driving the four-step pipeline through the [`ExtractionModel`] and
//! [`GraphSink`] seams.
//!
//! # Modules
//!
//! - [`config`] - Layered configuration (file, environment, defaults)
//! - [`content`] - Source document loading
//! - [`cypher`] - Statement splitting and structural summaries
//! - [`fence`] - Code block recovery from model replies
//! - [`models`] - Shared data types
//! - [`ontology`] - Turtle parsing and ontology rendering
//! - [`pipeline`] - The extraction pipeline
//! - [`prompt`] - Prompt construction

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod config;
pub mod content;
pub mod cypher;
pub mod fence;
pub mod models;
pub mod ontology;
pub mod pipeline;
pub mod prompt;

pub use config::*;
pub use content::load_document;
pub use cypher::{split_statements, ScriptSummary};
pub use fence::extract_fenced_block;
pub use models::*;
pub use ontology::OntologyGraph;
pub use pipeline::*;
pub use prompt::*;

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for kgbuilder
///
/// Every failure mode of the pipeline has its own variant so callers can
/// report it distinctly. None of them are recovered automatically.
#[derive(Error, Debug)]
pub enum KgbError {
    /// Input file does not exist
    #[error("File not found: {}", path.display())]
    FileNotFound {
        /// The missing path
        path: PathBuf,
    },

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ontology could not be parsed or serialized
    #[error("Ontology parse error: {0}")]
    OntologyParse(String),

    /// The completion request failed
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    /// The model reply did not contain a usable code block
    #[error("Unexpected response format: {0}")]
    ResponseFormat(String),

    /// The graph database could not be reached
    #[error("Database connection failed: {0}")]
    DatabaseConnection(String),

    /// The graph database rejected the script
    #[error("Script execution failed: {0}")]
    ScriptExecution(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// JSON or TOML serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias using [`KgbError`]
pub type Result<T> = std::result::Result<T, KgbError>;
