//! Extraction pipeline
//!
//! Four phases run strictly in order, each feeding the next:
//! content loading, ontology loading, extraction and graph writing. The
//! completion service and the graph database sit behind the
//! [`ExtractionModel`] and [`GraphSink`] traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::content::load_document;
use crate::fence::extract_fenced_block;
use crate::models::*;
use crate::ontology::OntologyGraph;
use crate::prompt::build_extraction_prompt;

/// Pipeline phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    /// Phase 1: Read the source document
    LoadContent,
    /// Phase 2: Parse and render the ontology
    LoadOntology,
    /// Phase 3: Prompt the model and recover the script
    Extraction,
    /// Phase 4: Write the script to the graph database
    GraphWrite,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::LoadContent => write!(f, "Load Content"),
            PipelinePhase::LoadOntology => write!(f, "Load Ontology"),
            PipelinePhase::Extraction => write!(f, "Extraction"),
            PipelinePhase::GraphWrite => write!(f, "Graph Write"),
        }
    }
}

/// A completion service that answers an extraction prompt.
#[async_trait]
pub trait ExtractionModel: Send + Sync {
    /// Identifier of the model answering the prompt
    fn model_name(&self) -> &str;

    /// Send the prompt and return the raw reply text.
    async fn complete(&self, prompt: &ExtractionPrompt) -> crate::Result<String>;
}

/// A graph database that accepts write scripts.
#[async_trait]
pub trait GraphSink: Send + Sync {
    /// Execute the whole script as one write operation.
    async fn write_script(&self, script: &CypherScript) -> crate::Result<WriteOutcome>;
}

/// Everything needed to call the model, built before any network traffic
#[derive(Debug, Clone)]
pub struct PreparedExtraction {
    /// Loaded document
    pub document: Document,
    /// Ontology file
    pub ontology_path: PathBuf,
    /// Number of triples in the ontology
    pub ontology_triples: usize,
    /// Prompt to send
    pub prompt: ExtractionPrompt,
    format: OntologyFormat,
    started: DateTime<Utc>,
}

/// Load the document, then the ontology, and build the prompt.
///
/// Needs neither the model nor the database, so local input errors surface
/// before any credentials are looked up.
#[instrument]
pub async fn prepare_extraction(
    document: &Path,
    ontology: &Path,
    format: OntologyFormat,
    base_iri: Option<&str>,
) -> crate::Result<PreparedExtraction> {
    let started = Utc::now();

    info!("Phase: {}", PipelinePhase::LoadContent);
    let document = load_document(document).await?;

    info!("Phase: {}", PipelinePhase::LoadOntology);
    let graph = OntologyGraph::load(ontology, base_iri).await?;
    if graph.is_empty() {
        warn!("Ontology {} contains no triples", ontology.display());
    }
    let rendered = graph.render(format)?;
    info!(
        "Rendered {} triples as {} ({} characters)",
        graph.len(),
        format,
        rendered.len()
    );

    let prompt = build_extraction_prompt(&rendered, &document.text);

    Ok(PreparedExtraction {
        document,
        ontology_path: ontology.to_path_buf(),
        ontology_triples: graph.len(),
        prompt,
        format,
        started,
    })
}

/// Pipeline for a single document
pub struct ExtractionPipeline {
    model: Arc<dyn ExtractionModel>,
    sink: Option<Arc<dyn GraphSink>>,
    format: OntologyFormat,
    base_iri: Option<String>,
    phase: PipelinePhase,
}

impl ExtractionPipeline {
    /// Create a pipeline that renders the ontology with `format`
    pub fn new(model: Arc<dyn ExtractionModel>, format: OntologyFormat) -> Self {
        Self {
            model,
            sink: None,
            format,
            base_iri: None,
            phase: PipelinePhase::LoadContent,
        }
    }

    /// Attach the graph database. Without one the run stops after extraction.
    pub fn with_sink(mut self, sink: Arc<dyn GraphSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Base IRI for relative IRIs in the ontology
    pub fn with_base_iri(mut self, base_iri: Option<String>) -> Self {
        self.base_iri = base_iri;
        self
    }

    /// Get current phase
    pub fn current_phase(&self) -> PipelinePhase {
        self.phase
    }

    /// Run phases 1 and 2 and build the prompt
    pub async fn prepare(&mut self, document: &Path, ontology: &Path) -> crate::Result<PreparedExtraction> {
        self.phase = PipelinePhase::LoadContent;
        let prepared =
            prepare_extraction(document, ontology, self.format, self.base_iri.as_deref()).await?;
        self.phase = PipelinePhase::LoadOntology;
        Ok(prepared)
    }

    /// Run phases 3 and 4 on a prepared prompt
    #[instrument(skip_all)]
    pub async fn execute(&mut self, prepared: PreparedExtraction) -> crate::Result<ExtractionRun> {
        self.phase = PipelinePhase::Extraction;
        info!("Phase: {} (model {})", self.phase, self.model.model_name());
        let reply = self.model.complete(&prepared.prompt).await?;
        let script = CypherScript::new(extract_fenced_block(&reply)?);

        let summary = script.summary();
        info!(
            "Recovered {} statement(s): {} MERGE clause(s), {} node pattern(s), {} relationship pattern(s)",
            summary.statements,
            summary.merge_clauses,
            summary.node_count(),
            summary.relationship_count()
        );
        if summary.merge_clauses == 0 {
            warn!("Script contains no MERGE clauses; repeated runs may duplicate data");
        }

        self.phase = PipelinePhase::GraphWrite;
        let write = match &self.sink {
            Some(sink) => {
                info!("Phase: {}", self.phase);
                let outcome = sink.write_script(&script).await?;
                info!("Executed {} statement(s)", outcome.statements_executed);
                Some(outcome)
            }
            None => {
                info!("Phase: {} (skipped, no graph database attached)", self.phase);
                None
            }
        };

        Ok(ExtractionRun {
            run_id: ExtractionRun::new_run_id(),
            document: prepared.document.source,
            ontology: prepared.ontology_path,
            ontology_triples: prepared.ontology_triples,
            ontology_format: prepared.format,
            model: self.model.model_name().to_string(),
            script,
            summary,
            write,
            timestamps: Timestamps {
                started: prepared.started,
                ended: Some(Utc::now()),
            },
        })
    }

    /// Run the complete pipeline
    pub async fn run(&mut self, document: &Path, ontology: &Path) -> crate::Result<ExtractionRun> {
        let prepared = self.prepare(document, ontology).await?;
        self.execute(prepared).await
    }
}
