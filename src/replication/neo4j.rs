//! Neo4j replication over the HTTP transactional endpoint
//!
//! One save becomes one `tx/commit` request: the process subgraph is deleted
//! and recreated from the snapshot, so the secondary store always mirrors the
//! primary copy.

use crate::graph::CanvasSnapshot;
use crate::replication::{GraphReplicator, ReplicationError};
use crate::sync::{SyncErrorType, SyncStats};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

/// Connection settings for the Neo4j HTTP API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neo4jSettings {
    /// Base URL, e.g. "http://localhost:7474"
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub statement: String,
    pub parameters: Value,
    #[serde(rename = "includeStats")]
    pub include_stats: bool,
}

impl Statement {
    fn new(statement: &str, parameters: Value) -> Self {
        Self {
            statement: statement.trim().to_string(),
            parameters,
            include_stats: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<Neo4jError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    stats: Option<StatementStats>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementStats {
    #[serde(default)]
    nodes_created: usize,
    #[serde(default)]
    relationships_created: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Neo4jError {
    pub code: String,
    pub message: String,
}

/// Classify a Neo4j status code such as `Neo.ClientError.Security.Unauthorized`
pub fn classify_neo4j_code(code: &str) -> SyncErrorType {
    let category = code.split('.').nth(2).unwrap_or_default();
    match category {
        "Security" => SyncErrorType::AuthError,
        "Statement" | "Schema" | "Procedure" | "Request" => SyncErrorType::QueryError,
        _ if code.contains("ServiceUnavailable") || code.contains("DatabaseUnavailable") => {
            SyncErrorType::ConnectionError
        }
        _ => SyncErrorType::UnknownError,
    }
}

/// Classify a transport-level failure
pub fn classify_transport_error(error: &reqwest::Error) -> SyncErrorType {
    if error.is_connect() || error.is_timeout() {
        SyncErrorType::ConnectionError
    } else if error.status().is_some_and(|s| s == StatusCode::UNAUTHORIZED || s == StatusCode::FORBIDDEN) {
        SyncErrorType::AuthError
    } else if error.is_decode() {
        SyncErrorType::QueryError
    } else {
        SyncErrorType::UnknownError
    }
}

/// Cypher statements that replace the process subgraph with `snapshot`
pub fn replication_statements(snapshot: &CanvasSnapshot) -> Vec<Statement> {
    let pid = snapshot.process_id();
    let process = &snapshot.process;

    let steps: Vec<Value> = snapshot
        .steps
        .iter()
        .map(|s| {
            json!({
                "process_id": pid,
                "step_id": s.step_id,
                "name": s.name,
                "description": s.description,
                "step_type": s.step_type,
            })
        })
        .collect();

    let implementations: Vec<Value> = snapshot
        .implementations
        .iter()
        .map(|i| {
            json!({
                "process_id": pid,
                "impl_id": i.impl_id,
                "name": i.name,
                "type": i.impl_type,
                "system": i.system,
                "code_ref": i.code_ref,
            })
        })
        .collect();

    let data_resources: Vec<Value> = snapshot
        .data_resources
        .iter()
        .map(|d| {
            json!({
                "process_id": pid,
                "resource_id": d.resource_id,
                "name": d.name,
                "type": d.resource_type,
                "system": d.system,
                "description": d.description,
            })
        })
        .collect();

    let next: Vec<Value> = snapshot
        .edges
        .iter()
        .map(|e| {
            json!({
                "from": e.from_step_id,
                "to": e.to_step_id,
                "props": {
                    "id": e.id,
                    "edge_type": e.edge_type,
                    "condition": e.condition,
                    "label": e.label,
                },
            })
        })
        .collect();

    let implemented_by: Vec<Value> = snapshot
        .step_impl_links
        .iter()
        .map(|l| json!({ "from": l.step_id, "to": l.impl_id, "props": { "id": l.id } }))
        .collect();

    let accesses: Vec<Value> = snapshot
        .impl_data_links
        .iter()
        .map(|l| {
            json!({
                "from": l.impl_id,
                "to": l.resource_id,
                "props": {
                    "id": l.id,
                    "access_type": l.access_type,
                    "access_pattern": l.access_pattern,
                },
            })
        })
        .collect();

    let calls: Vec<Value> = snapshot
        .impl_links
        .iter()
        .map(|l| {
            json!({
                "from": l.from_impl_id,
                "to": l.to_impl_id,
                "props": {
                    "id": l.id,
                    "edge_type": l.edge_type,
                    "condition": l.condition,
                    "label": l.label,
                },
            })
        })
        .collect();

    vec![
        Statement::new(
            "MATCH (n {process_id: $process_id}) DETACH DELETE n",
            json!({ "process_id": pid }),
        ),
        Statement::new(
            "CREATE (p:Process) SET p = $props",
            json!({
                "props": {
                    "process_id": pid,
                    "name": process.name,
                    "channel": process.channel,
                    "description": process.description,
                    "entrypoints": process.entrypoints,
                }
            }),
        ),
        Statement::new("UNWIND $rows AS row CREATE (n:Step) SET n = row", json!({ "rows": steps })),
        Statement::new(
            "UNWIND $rows AS row CREATE (n:Implementation) SET n = row",
            json!({ "rows": implementations }),
        ),
        Statement::new(
            "UNWIND $rows AS row CREATE (n:DataResource) SET n = row",
            json!({ "rows": data_resources }),
        ),
        Statement::new(
            r#"
            UNWIND $rows AS row
            MATCH (a:Step {process_id: $process_id, step_id: row.from})
            MATCH (b:Step {process_id: $process_id, step_id: row.to})
            CREATE (a)-[r:NEXT]->(b) SET r = row.props
            "#,
            json!({ "process_id": pid, "rows": next }),
        ),
        Statement::new(
            r#"
            UNWIND $rows AS row
            MATCH (a:Step {process_id: $process_id, step_id: row.from})
            MATCH (b:Implementation {process_id: $process_id, impl_id: row.to})
            CREATE (a)-[r:IMPLEMENTED_BY]->(b) SET r = row.props
            "#,
            json!({ "process_id": pid, "rows": implemented_by }),
        ),
        Statement::new(
            r#"
            UNWIND $rows AS row
            MATCH (a:Implementation {process_id: $process_id, impl_id: row.from})
            MATCH (b:DataResource {process_id: $process_id, resource_id: row.to})
            CREATE (a)-[r:ACCESSES]->(b) SET r = row.props
            "#,
            json!({ "process_id": pid, "rows": accesses }),
        ),
        Statement::new(
            r#"
            UNWIND $rows AS row
            MATCH (a:Implementation {process_id: $process_id, impl_id: row.from})
            MATCH (b:Implementation {process_id: $process_id, impl_id: row.to})
            CREATE (a)-[r:CALLS]->(b) SET r = row.props
            "#,
            json!({ "process_id": pid, "rows": calls }),
        ),
    ]
}

#[derive(Debug, Clone)]
pub struct Neo4jReplicator {
    settings: Neo4jSettings,
    client: Client,
}

impl Neo4jReplicator {
    pub fn new(settings: Neo4jSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build Neo4j HTTP client: {}", e))?;
        Ok(Self { settings, client })
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.settings.url.trim_end_matches('/'),
            self.settings.database
        )
    }
}

#[async_trait]
impl GraphReplicator for Neo4jReplicator {
    async fn replicate(&self, snapshot: &CanvasSnapshot) -> Result<SyncStats, ReplicationError> {
        let statements = replication_statements(snapshot);
        tracing::debug!(
            "🕸️ Replicating canvas '{}' to Neo4j with {} statements",
            snapshot.process_id(),
            statements.len()
        );

        let response = self
            .client
            .post(self.commit_url())
            .basic_auth(&self.settings.user, Some(&self.settings.password))
            .json(&json!({ "statements": statements }))
            .send()
            .await
            .map_err(|e| ReplicationError::new(classify_transport_error(&e), e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ReplicationError::new(
                SyncErrorType::AuthError,
                format!("Neo4j rejected credentials (HTTP {})", status),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error_type = if status == StatusCode::SERVICE_UNAVAILABLE {
                SyncErrorType::ConnectionError
            } else {
                SyncErrorType::UnknownError
            };
            return Err(ReplicationError::new(
                error_type,
                format!("Neo4j returned HTTP {}: {}", status, body),
            ));
        }

        let body: CommitResponse = response.json().await.map_err(|e| {
            ReplicationError::new(
                SyncErrorType::UnknownError,
                format!("Unreadable Neo4j response: {}", e),
            )
        })?;

        stats_from_response(body)
    }
}

fn stats_from_response(body: CommitResponse) -> Result<SyncStats, ReplicationError> {
    if let Some(first) = body.errors.first() {
        return Err(ReplicationError::new(
            classify_neo4j_code(&first.code),
            format!("{}: {}", first.code, first.message),
        ));
    }

    let mut stats = SyncStats::default();
    for result in body.results {
        let s = result.stats.unwrap_or_default();
        stats.nodes += s.nodes_created;
        stats.relationships += s.relationships_created;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures;

    #[test]
    fn statements_cover_every_record() {
        let snapshot = fixtures::full_process();
        let statements = replication_statements(&snapshot);
        assert_eq!(statements.len(), 9);
        assert!(statements[0].statement.contains("DETACH DELETE"));
        assert_eq!(statements[0].parameters["process_id"], "p-orders");
        assert_eq!(statements[2].parameters["rows"].as_array().unwrap().len(), 3);
        assert_eq!(statements[3].parameters["rows"][0]["type"], "api");
        assert_eq!(statements[7].parameters["rows"].as_array().unwrap().len(), 3);
        assert_eq!(statements[8].parameters["rows"][0]["props"]["label"], "credit check");

        let body = serde_json::to_value(&statements[5]).unwrap();
        assert_eq!(body["includeStats"], true);
    }

    #[test]
    fn neo4j_codes_are_classified() {
        assert_eq!(
            classify_neo4j_code("Neo.ClientError.Security.Unauthorized"),
            SyncErrorType::AuthError
        );
        assert_eq!(
            classify_neo4j_code("Neo.ClientError.Statement.SyntaxError"),
            SyncErrorType::QueryError
        );
        assert_eq!(
            classify_neo4j_code("Neo.TransientError.General.DatabaseUnavailable"),
            SyncErrorType::ConnectionError
        );
        assert_eq!(
            classify_neo4j_code("Neo.DatabaseError.General.UnknownError"),
            SyncErrorType::UnknownError
        );
    }

    #[test]
    fn response_errors_fail_the_replication() {
        let body: CommitResponse = serde_json::from_value(json!({
            "results": [],
            "errors": [{ "code": "Neo.ClientError.Statement.SyntaxError", "message": "Invalid input" }]
        }))
        .unwrap();
        let err = stats_from_response(body).unwrap_err();
        assert_eq!(err.error_type, SyncErrorType::QueryError);
        assert!(err.message.contains("Invalid input"));
    }

    #[test]
    fn stats_are_summed_over_statements() {
        let body: CommitResponse = serde_json::from_value(json!({
            "results": [
                { "columns": [], "data": [], "stats": { "nodes_created": 1, "relationships_created": 0 } },
                { "columns": [], "data": [], "stats": { "nodes_created": 3 } },
                { "columns": [], "data": [], "stats": { "relationships_created": 2 } }
            ],
            "errors": []
        }))
        .unwrap();
        assert_eq!(
            stats_from_response(body).unwrap(),
            SyncStats { nodes: 4, relationships: 2 }
        );
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error() {
        let replicator = Neo4jReplicator::new(Neo4jSettings {
            url: "http://127.0.0.1:1".to_string(),
            database: "neo4j".to_string(),
            user: "neo4j".to_string(),
            password: "secret".to_string(),
            timeout_secs: 2,
        })
        .unwrap();

        let err = replicator.replicate(&fixtures::chain()).await.unwrap_err();
        assert_eq!(err.error_type, SyncErrorType::ConnectionError);
    }
}
