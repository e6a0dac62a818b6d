use async_trait::async_trait;
use kgb_core::{
    prepare_extraction, CypherScript, ExtractionModel, ExtractionPipeline, ExtractionPrompt,
    GraphSink, KgbError, OntologyFormat, PipelinePhase, WriteOutcome,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const ART_TTL: &str = include_str!("fixtures/art.ttl");

/// Model double that returns a canned reply and records prompts
struct CannedModel {
    reply: String,
    calls: AtomicUsize,
    prompts: Mutex<Vec<ExtractionPrompt>>,
}

impl CannedModel {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ExtractionModel for CannedModel {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, prompt: &ExtractionPrompt) -> kgb_core::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().expect("lock").push(prompt.clone());
        Ok(self.reply.clone())
    }
}

/// Sink double that records scripts
#[derive(Default)]
struct RecordingSink {
    scripts: Mutex<Vec<CypherScript>>,
}

#[async_trait]
impl GraphSink for RecordingSink {
    async fn write_script(&self, script: &CypherScript) -> kgb_core::Result<WriteOutcome> {
        self.scripts.lock().expect("lock").push(script.clone());
        Ok(WriteOutcome {
            statements_executed: script.statements().len(),
        })
    }
}

/// Sink double that always fails
struct FailingSink;

#[async_trait]
impl GraphSink for FailingSink {
    async fn write_script(&self, _script: &CypherScript) -> kgb_core::Result<WriteOutcome> {
        Err(KgbError::ScriptExecution("Invalid input 'MERG'".to_string()))
    }
}

const MONA_LISA_REPLY: &str = "```cypher
MERGE (a:Person {name: \"Alice\"})
MERGE (p:Painting {title: \"Mona Lisa\"})
MERGE (a)-[:painted]->(p)
```";

fn fixtures(document: &str) -> (TempDir, PathBuf, PathBuf) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let doc = dir.path().join("mona-lisa.txt");
    let ttl = dir.path().join("art.ttl");
    std::fs::write(&doc, document).expect("Failed to write document");
    std::fs::write(&ttl, ART_TTL).expect("Failed to write ontology");
    (dir, doc, ttl)
}

#[tokio::test]
async fn test_mona_lisa_scenario() -> anyhow::Result<()> {
    let (_dir, doc, ttl) = fixtures("Alice painted the Mona Lisa.\n");
    let model = Arc::new(CannedModel::new(MONA_LISA_REPLY));
    let sink = Arc::new(RecordingSink::default());

    let mut pipeline = ExtractionPipeline::new(model.clone(), OntologyFormat::NaturalLanguage)
        .with_sink(sink.clone());
    let run = pipeline.run(&doc, &ttl).await?;

    assert_eq!(pipeline.current_phase(), PipelinePhase::GraphWrite);
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);

    // Structure, not literal text
    assert_eq!(run.summary.node_labels.get("Person"), Some(&1));
    assert_eq!(run.summary.node_labels.get("Painting"), Some(&1));
    assert_eq!(run.summary.relationship_types.get("painted"), Some(&1));
    assert_eq!(run.summary.node_count(), 2);
    assert_eq!(run.summary.relationship_count(), 1);

    assert_eq!(run.model, "canned");
    assert_eq!(run.ontology_triples, 15);
    assert_eq!(run.write.map(|w| w.statements_executed), Some(1));
    assert!(run.timestamps.ended.is_some());

    let scripts = sink.scripts.lock().expect("lock");
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].text.starts_with("MERGE (a:Person"));
    assert!(!scripts[0].text.contains("```"));

    Ok(())
}

#[tokio::test]
async fn test_prompt_embeds_rendered_ontology_then_document() -> anyhow::Result<()> {
    let (_dir, doc, ttl) = fixtures("Alice painted\nthe Mona Lisa.");
    let model = Arc::new(CannedModel::new(MONA_LISA_REPLY));

    let mut pipeline = ExtractionPipeline::new(model.clone(), OntologyFormat::Turtle);
    let prepared = pipeline.prepare(&doc, &ttl).await?;

    assert_eq!(prepared.document.text, "Alice paintedthe Mona Lisa.");
    let user = &prepared.prompt.user;
    let ontology_at = user.find("<http://example.org/art#painted>").expect("turtle in prompt");
    let content_at = user.find("Alice paintedthe Mona Lisa.").expect("document in prompt");
    assert!(ontology_at < content_at);

    // Nothing sent yet
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);

    let run = pipeline.execute(prepared).await?;
    assert!(run.write.is_none());
    assert_eq!(run.ontology_format, OntologyFormat::Turtle);

    let prompts = model.prompts.lock().expect("lock");
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].user.contains("CONTENT: \n Alice paintedthe Mona Lisa."));

    Ok(())
}

#[tokio::test]
async fn test_missing_document_fails_before_model_call() {
    let (dir, _doc, ttl) = fixtures("unused");
    let missing = dir.path().join("does-not-exist.txt");
    let model = Arc::new(CannedModel::new(MONA_LISA_REPLY));

    let mut pipeline = ExtractionPipeline::new(model.clone(), OntologyFormat::NaturalLanguage);
    let err = pipeline.run(&missing, &ttl).await.unwrap_err();

    assert!(matches!(err, KgbError::FileNotFound { ref path } if *path == missing));
    assert_eq!(pipeline.current_phase(), PipelinePhase::LoadContent);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bad_ontology_fails_before_model_call() {
    let (dir, doc, _ttl) = fixtures("Alice painted the Mona Lisa.");
    let broken = dir.path().join("broken.ttl");
    std::fs::write(&broken, "@prefix : <http://example.org/> .\n:a :b").expect("write");
    let model = Arc::new(CannedModel::new(MONA_LISA_REPLY));

    let mut pipeline = ExtractionPipeline::new(model.clone(), OntologyFormat::Turtle);
    let err = pipeline.run(&doc, &broken).await.unwrap_err();

    assert!(matches!(err, KgbError::OntologyParse(_)));
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unfenced_reply_is_a_format_error() {
    let (_dir, doc, ttl) = fixtures("Alice painted the Mona Lisa.");
    let model = Arc::new(CannedModel::new("MERGE (a:Person {name: \"Alice\"})"));
    let sink = Arc::new(RecordingSink::default());

    let mut pipeline =
        ExtractionPipeline::new(model, OntologyFormat::NaturalLanguage).with_sink(sink.clone());
    let err = pipeline.run(&doc, &ttl).await.unwrap_err();

    assert!(matches!(err, KgbError::ResponseFormat(_)));
    assert!(sink.scripts.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn test_sink_failure_propagates() {
    let (_dir, doc, ttl) = fixtures("Alice painted the Mona Lisa.");
    let model = Arc::new(CannedModel::new(MONA_LISA_REPLY));

    let mut pipeline = ExtractionPipeline::new(model, OntologyFormat::NaturalLanguage)
        .with_sink(Arc::new(FailingSink));
    let err = pipeline.run(&doc, &ttl).await.unwrap_err();

    assert!(matches!(err, KgbError::ScriptExecution(_)));
    assert_eq!(pipeline.current_phase(), PipelinePhase::GraphWrite);
}

#[tokio::test]
async fn test_prepare_without_model_reports_missing_document() {
    let (dir, _doc, ttl) = fixtures("unused");
    let missing = dir.path().join("does-not-exist.txt");

    let err = prepare_extraction(&missing, &ttl, OntologyFormat::NaturalLanguage, None)
        .await
        .unwrap_err();

    assert!(matches!(err, KgbError::FileNotFound { ref path } if *path == missing));
}

#[tokio::test]
async fn test_prepared_extraction_runs_on_a_later_pipeline() -> anyhow::Result<()> {
    let (_dir, doc, ttl) = fixtures("Alice painted the Mona Lisa.");

    let prepared = prepare_extraction(&doc, &ttl, OntologyFormat::Turtle, None).await?;
    assert_eq!(prepared.ontology_triples, 15);
    assert!(prepared.prompt.user.ends_with("Alice painted the Mona Lisa."));

    let model = Arc::new(CannedModel::new(MONA_LISA_REPLY));
    let mut pipeline = ExtractionPipeline::new(model.clone(), OntologyFormat::Turtle);
    let run = pipeline.execute(prepared).await?;

    assert_eq!(run.ontology_format, OntologyFormat::Turtle);
    assert!(run.write.is_none());
    assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    Ok(())
}
