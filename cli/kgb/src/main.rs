//! kgbuilder CLI

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use kgb_core::{
    prepare_extraction, ExtractionPipeline, KgbConfig, OntologyFormat, OntologyGraph,
    ENV_OPENAI_API_KEY,
};
use kgb_neo4j::{Neo4jConfig, Neo4jSink, Neo4jWriter};
use kgb_openai::{ClientConfig, OpenAIClient, OpenAIExtractor};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kgb")]
#[command(about = "Extract an ontology-constrained knowledge graph from text into Neo4j")]
#[command(version)]
struct Cli {
    /// Config file (defaults to <config dir>/kgbuilder/config.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities from a document and write them to the graph
    Extract {
        /// Plain-text document to read
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// Turtle ontology (overrides ontology.path)
        #[arg(short, long)]
        ontology: Option<PathBuf>,

        /// How the ontology is rendered into the prompt
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Base IRI for relative IRIs in the ontology
        #[arg(long)]
        base_iri: Option<String>,

        #[command(flatten)]
        llm: LlmArgs,

        #[command(flatten)]
        neo4j: Neo4jArgs,

        /// Print the script without writing to the database
        #[arg(long)]
        dry_run: bool,

        /// Print the prompt before sending it
        #[arg(long)]
        print_prompt: bool,

        /// Write the run manifest as JSON
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Render an ontology the way it is embedded in the prompt
    Ontology {
        /// Turtle ontology
        #[arg(value_name = "ONTOLOGY")]
        path: PathBuf,

        /// Rendering to print
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Base IRI for relative IRIs in the ontology
        #[arg(long)]
        base_iri: Option<String>,
    },

    /// Check that the graph database answers
    CheckDb {
        #[command(flatten)]
        neo4j: Neo4jArgs,
    },
}

#[derive(Args, Default)]
struct LlmArgs {
    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Args, Default)]
struct Neo4jArgs {
    /// Bolt URI
    #[arg(long)]
    neo4j_uri: Option<String>,

    /// Database user
    #[arg(long)]
    neo4j_user: Option<String>,

    /// Database name
    #[arg(long)]
    database: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Re-serialized Turtle
    Turtle,
    /// Prose description
    NaturalLanguage,
}

impl From<FormatArg> for OntologyFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Turtle => OntologyFormat::Turtle,
            FormatArg::NaturalLanguage => OntologyFormat::NaturalLanguage,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the script
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = KgbConfig::load(cli.config.as_deref())?;
    debug!("Loaded config: {:?}", config);

    match cli.command {
        Commands::Extract {
            document,
            ontology,
            format,
            base_iri,
            llm,
            neo4j,
            dry_run,
            print_prompt,
            report,
        } => {
            apply_llm_args(&mut config, &llm);
            apply_neo4j_args(&mut config, &neo4j);
            if let Some(format) = format {
                config.ontology.format = format.into();
            }
            if base_iri.is_some() {
                config.ontology.base_iri = base_iri;
            }
            if ontology.is_some() {
                config.ontology.path = ontology;
            }
            config.validate()?;

            extract(&config, &document, dry_run, print_prompt, report.as_deref()).await
        }
        Commands::Ontology {
            path,
            format,
            base_iri,
        } => {
            let format = format.map(Into::into).unwrap_or(config.ontology.format);
            let base_iri = base_iri.or(config.ontology.base_iri);
            let graph = OntologyGraph::load(&path, base_iri.as_deref()).await?;
            print!("{}", graph.render(format)?);
            Ok(())
        }
        Commands::CheckDb { neo4j } => {
            apply_neo4j_args(&mut config, &neo4j);
            config.validate()?;
            check_db(&config).await
        }
    }
}

fn apply_llm_args(config: &mut KgbConfig, args: &LlmArgs) {
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.llm.base_url = base_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.llm.timeout_seconds = timeout;
    }
}

fn apply_neo4j_args(config: &mut KgbConfig, args: &Neo4jArgs) {
    if let Some(uri) = &args.neo4j_uri {
        config.neo4j.uri = uri.clone();
    }
    if let Some(user) = &args.neo4j_user {
        config.neo4j.user = user.clone();
    }
    if args.database.is_some() {
        config.neo4j.database = args.database.clone();
    }
}

fn neo4j_config(config: &KgbConfig) -> anyhow::Result<Neo4jConfig> {
    let password = config.neo4j.password.clone().ok_or_else(|| {
        anyhow::anyhow!("No Neo4j password configured. Set NEO4J_PASSWORD or neo4j.password.")
    })?;
    Ok(Neo4jConfig::from_settings(&config.neo4j, password))
}

fn openai_api_key<F>(lookup: F) -> anyhow::Result<SecretString>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(ENV_OPENAI_API_KEY)
        .filter(|k| !k.trim().is_empty())
        .map(SecretString::from)
        .ok_or_else(|| anyhow::anyhow!("{} is not set", ENV_OPENAI_API_KEY))
}

async fn extract(
    config: &KgbConfig,
    document: &Path,
    dry_run: bool,
    print_prompt: bool,
    report: Option<&Path>,
) -> anyhow::Result<()> {
    let ontology = config.ontology.path.clone().ok_or_else(|| {
        anyhow::anyhow!("No ontology given. Pass --ontology or set ontology.path in the config.")
    })?;

    eprintln!("{}", style("🧠 Knowledge Graph Extraction").bold().cyan());
    eprintln!("  Document: {}", document.display());
    eprintln!("  Ontology: {} ({})", ontology.display(), config.ontology.format);
    eprintln!("  Model: {}", config.llm.model);
    let target = if dry_run {
        style("dry run").yellow().to_string()
    } else {
        style(&config.neo4j.uri).green().to_string()
    };
    eprintln!("  Target: {}", target);
    eprintln!();

    // Local inputs first, so a bad path is reported before missing credentials
    let prepared = prepare_extraction(
        document,
        &ontology,
        config.ontology.format,
        config.ontology.base_iri.as_deref(),
    )
    .await?;
    if print_prompt {
        eprintln!("{}", style("📝 Prompt").bold());
        eprintln!("[system]\n{}\n", prepared.prompt.system);
        eprintln!("[user]\n{}\n", prepared.prompt.user);
    }

    let api_key = openai_api_key(|key| std::env::var(key).ok())?;
    let client = OpenAIClient::new(ClientConfig::from_settings(&config.llm, api_key))?;

    let mut pipeline = ExtractionPipeline::new(
        Arc::new(OpenAIExtractor::new(client)),
        config.ontology.format,
    )
    .with_base_iri(config.ontology.base_iri.clone());
    if !dry_run {
        pipeline = pipeline.with_sink(Arc::new(Neo4jSink::new(neo4j_config(config)?)));
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("Waiting for the model...");

    let run = pipeline.execute(prepared).await;
    pb.finish_and_clear();
    let run = run?;

    // The recovered script
    println!("{}", run.script);

    eprintln!("\n{}", style("📊 Extraction Summary").bold().green());
    eprintln!("  Run ID: {}", run.run_id);
    eprintln!("  Statements: {}", run.summary.statements);
    for (label, count) in &run.summary.node_labels {
        eprintln!("  Node :{} x{}", label, count);
    }
    for (rel_type, count) in &run.summary.relationship_types {
        eprintln!("  Relationship :{} x{}", rel_type, count);
    }
    match &run.write {
        Some(outcome) => eprintln!(
            "  Written: {} statement(s) to {}",
            outcome.statements_executed, config.neo4j.uri
        ),
        None => eprintln!("  Written: {}", style("skipped (dry run)").yellow()),
    }

    if let Some(path) = report {
        let json = run.to_json()?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        eprintln!("  Report: {}", path.display());
    }

    eprintln!("\n{}", style("✅ Done!").green().bold());
    Ok(())
}

async fn check_db(config: &KgbConfig) -> anyhow::Result<()> {
    eprintln!(
        "{}",
        style(format!("🧪 Testing connection: {}", config.neo4j.uri)).bold()
    );

    let writer = Neo4jWriter::connect(neo4j_config(config)?).await?;
    let result = writer.ping().await;
    writer.close();

    match result {
        Ok(()) => {
            eprintln!("{}", style("✅ Connection successful!").green());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", style("❌ Connection failed").red());
            Err(e.into())
        }
    }
}
