//! Neo4j graph writer
//!
//! Executes a recovered Cypher script over Bolt. All statements of a script
//! run in one explicit transaction that is either committed or rolled back
//! before [`Neo4jWriter::write_script`] returns.

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use async_trait::async_trait;
use kgb_core::{CypherScript, GraphSink, KgbError, Neo4jSettings, WriteOutcome};
use neo4rs::{query, ConfigBuilder, Graph};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, instrument, warn};

/// Connection parameters
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// Bolt URI (e.g. "bolt://localhost:7687")
    pub uri: String,
    /// User name
    pub user: String,
    /// Password
    pub password: SecretString,
    /// Database name, server default when unset
    pub database: Option<String>,
}

impl Neo4jConfig {
    /// Build connection parameters from the `[neo4j]` settings
    pub fn from_settings(settings: &Neo4jSettings, password: SecretString) -> Self {
        Self {
            uri: settings.uri.clone(),
            user: settings.user.clone(),
            password,
            database: settings.database.clone(),
        }
    }
}

/// Writes scripts to a Neo4j database
pub struct Neo4jWriter {
    graph: Graph,
    uri: String,
}

impl Neo4jWriter {
    /// Open a connection
    #[instrument(skip(config), fields(uri = %config.uri, user = %config.user))]
    pub async fn connect(config: Neo4jConfig) -> kgb_core::Result<Self> {
        let mut builder = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.expose_secret())
            .max_connections(1);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }

        let neo_config = builder
            .build()
            .map_err(|e| KgbError::DatabaseConnection(e.to_string()))?;
        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| KgbError::DatabaseConnection(e.to_string()))?;

        info!("Connected to {}", config.uri);
        Ok(Self {
            graph,
            uri: config.uri,
        })
    }

    /// Run a trivial query to confirm the server answers
    pub async fn ping(&self) -> kgb_core::Result<()> {
        self.graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| KgbError::DatabaseConnection(e.to_string()))
    }

    /// Release the connection
    pub fn close(self) {
        debug!("Closing connection to {}", self.uri);
        drop(self.graph);
    }
}

/// Statements to send, in order; an empty script is rejected
pub fn prepare_statements(script: &CypherScript) -> kgb_core::Result<Vec<String>> {
    let statements = script.statements();
    if statements.is_empty() {
        return Err(KgbError::ScriptExecution(
            "script contains no statements".to_string(),
        ));
    }
    Ok(statements)
}

#[async_trait]
impl GraphSink for Neo4jWriter {
    #[instrument(skip_all)]
    async fn write_script(&self, script: &CypherScript) -> kgb_core::Result<WriteOutcome> {
        let statements = prepare_statements(script)?;

        let mut txn = self
            .graph
            .start_txn()
            .await
            .map_err(|e| KgbError::DatabaseConnection(e.to_string()))?;

        for (i, statement) in statements.iter().enumerate() {
            debug!("Running statement {}/{}", i + 1, statements.len());
            if let Err(e) = txn.run(query(statement)).await {
                error!("Statement {} failed: {}", i + 1, e);
                if let Err(rollback) = txn.rollback().await {
                    warn!("Rollback failed: {}", rollback);
                }
                return Err(KgbError::ScriptExecution(format!(
                    "statement {} of {}: {}",
                    i + 1,
                    statements.len(),
                    e
                )));
            }
        }

        txn.commit()
            .await
            .map_err(|e| KgbError::ScriptExecution(format!("commit failed: {e}")))?;

        Ok(WriteOutcome {
            statements_executed: statements.len(),
        })
    }
}

/// Connects on each write and releases the connection afterwards,
/// whether the write succeeded or not
#[derive(Debug, Clone)]
pub struct Neo4jSink {
    config: Neo4jConfig,
}

impl Neo4jSink {
    /// Create a sink; nothing is opened until the first write
    pub fn new(config: Neo4jConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl GraphSink for Neo4jSink {
    async fn write_script(&self, script: &CypherScript) -> kgb_core::Result<WriteOutcome> {
        let writer = Neo4jWriter::connect(self.config.clone()).await?;
        let result = writer.write_script(script).await;
        writer.close();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = Neo4jSettings {
            database: Some("art".to_string()),
            ..Neo4jSettings::default()
        };
        let config = Neo4jConfig::from_settings(&settings, SecretString::new("pw".into()));
        assert_eq!(config.uri, "bolt://localhost:7687");
        assert_eq!(config.user, "neo4j");
        assert_eq!(config.database.as_deref(), Some("art"));
        assert_eq!(config.password.expose_secret(), "pw");
        assert!(!format!("{:?}", config).contains("\"pw\""));
    }

    #[test]
    fn test_prepare_statements_splits_script() {
        let script = CypherScript::new("MERGE (a:Person {name: 'Alice'});\nMERGE (p:Painting {title: 'Mona Lisa'});");
        let statements = prepare_statements(&script).expect("statements");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1], "MERGE (p:Painting {title: 'Mona Lisa'})");
    }

    #[test]
    fn test_prepare_statements_rejects_empty_script() {
        let script = CypherScript::new("  // nothing to write\n ; ");
        assert!(matches!(
            prepare_statements(&script),
            Err(KgbError::ScriptExecution(_))
        ));
    }
}
