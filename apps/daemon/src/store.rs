// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! SQLite-backed persistence for pipelines and episodes.
//!
//! Per spec §3/§6, the persistence layer is an external collaborator
//! scoped to a thin CRUD facade: each row stores its scalar columns
//! directly and its nested array/object fields as JSON text columns.
//! `rusqlite` is synchronous, so every operation here is dispatched
//! through `tokio::task::spawn_blocking`; the single `Mutex` around the
//! connection is the one write lock the low write volume of this
//! workload can afford.

use std::path::Path;
use std::sync::{Arc, Mutex};

use opencli_api::{EpisodeScript, Pipeline};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::DaemonError;

/// A linked pipeline id, stored alongside an episode row once
/// `build-pipeline` compiles and saves one for it.
pub type EpisodeRow = (EpisodeScript, Option<String>);

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens (creating if absent) the sqlite database at `db_path` and
    /// runs the schema migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// database file cannot be opened.
    pub fn open(db_path: &Path) -> Result<Self, DaemonError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS pipelines (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                nodes TEXT NOT NULL,
                edges TEXT NOT NULL,
                parameters TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS episodes (
                id TEXT PRIMARY KEY,
                script TEXT NOT NULL,
                pipeline_id TEXT
            );",
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Opens an in-memory database, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema migration fails.
    pub fn open_in_memory() -> Result<Self, DaemonError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE pipelines (
                id TEXT PRIMARY KEY, name TEXT NOT NULL, description TEXT NOT NULL DEFAULT '',
                nodes TEXT NOT NULL, edges TEXT NOT NULL, parameters TEXT NOT NULL,
                created_at TEXT NOT NULL, updated_at TEXT NOT NULL
            );
            CREATE TABLE episodes (id TEXT PRIMARY KEY, script TEXT NOT NULL, pipeline_id TEXT);",
        )?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, DaemonError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let joined = tokio::task::spawn_blocking(move || {
            let guard = conn.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            f(&guard)
        })
        .await
        .map_err(|e| DaemonError::Io(std::io::Error::other(e.to_string())))?;
        joined.map_err(DaemonError::Store)
    }

    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>, DaemonError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name, description, nodes, edges, parameters, created_at, updated_at FROM pipelines ORDER BY updated_at DESC")?;
            let rows = stmt.query_map([], row_to_pipeline)?;
            rows.collect()
        }).await
    }

    pub async fn get_pipeline(&self, id: &str) -> Result<Option<Pipeline>, DaemonError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, name, description, nodes, edges, parameters, created_at, updated_at FROM pipelines WHERE id = ?1",
                params![id],
                row_to_pipeline,
            )
            .optional()
        })
        .await
    }

    pub async fn put_pipeline(&self, pipeline: Pipeline) -> Result<(), DaemonError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO pipelines (id, name, description, nodes, edges, parameters, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name, description = excluded.description, nodes = excluded.nodes,
                   edges = excluded.edges, parameters = excluded.parameters, updated_at = excluded.updated_at",
                params![
                    pipeline.id,
                    pipeline.name,
                    pipeline.description,
                    serde_json::to_string(&pipeline.nodes).unwrap_or_default(),
                    serde_json::to_string(&pipeline.edges).unwrap_or_default(),
                    serde_json::to_string(&pipeline.parameters).unwrap_or_default(),
                    pipeline.created_at,
                    pipeline.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn delete_pipeline(&self, id: &str) -> Result<bool, DaemonError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let affected = conn.execute("DELETE FROM pipelines WHERE id = ?1", params![id])?;
            Ok(affected > 0)
        })
        .await
    }

    pub async fn list_episodes(&self) -> Result<Vec<(String, EpisodeRow)>, DaemonError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, script, pipeline_id FROM episodes")?;
            let rows = stmt.query_map([], row_to_episode)?;
            rows.collect()
        })
        .await
    }

    pub async fn get_episode(&self, id: &str) -> Result<Option<EpisodeRow>, DaemonError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row("SELECT id, script, pipeline_id FROM episodes WHERE id = ?1", params![id], |row| {
                row_to_episode(row).map(|(_, data)| data)
            })
            .optional()
        })
        .await
    }

    pub async fn put_episode(&self, id: String, script: EpisodeScript, pipeline_id: Option<String>) -> Result<(), DaemonError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO episodes (id, script, pipeline_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET script = excluded.script, pipeline_id = excluded.pipeline_id",
                params![id, serde_json::to_string(&script).unwrap_or_default(), pipeline_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn delete_episode(&self, id: &str) -> Result<bool, DaemonError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let affected = conn.execute("DELETE FROM episodes WHERE id = ?1", params![id])?;
            Ok(affected > 0)
        })
        .await
    }
}

fn row_to_pipeline(row: &rusqlite::Row) -> rusqlite::Result<Pipeline> {
    let nodes: String = row.get(3)?;
    let edges: String = row.get(4)?;
    let parameters: String = row.get(5)?;
    Ok(Pipeline {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        nodes: parse_json_column(&nodes, 3)?,
        edges: parse_json_column(&edges, 4)?,
        parameters: parse_json_column(&parameters, 5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn row_to_episode(row: &rusqlite::Row) -> rusqlite::Result<(String, EpisodeRow)> {
    let id: String = row.get(0)?;
    let script_json: String = row.get(1)?;
    let pipeline_id: Option<String> = row.get(2)?;
    let script: EpisodeScript = parse_json_column(&script_json, 1)?;
    Ok((id, (script, pipeline_id)))
}

fn parse_json_column<T: serde::de::DeserializeOwned>(text: &str, column: usize) -> rusqlite::Result<T> {
    serde_json::from_str(text).map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e)))
}

/// Builds an `Option<Value>`-flavoured response object merging an
/// episode's pipeline link, for handlers that return `{episode, pipeline_id}`.
#[must_use]
pub fn episode_to_value(id: &str, script: &EpisodeScript, pipeline_id: Option<&str>) -> Value {
    let mut value = serde_json::to_value(script).unwrap_or(Value::Null);
    if let Value::Object(map) = &mut value {
        map.insert("id".to_string(), Value::String(id.to_string()));
        map.insert("pipeline_id".to_string(), pipeline_id.map_or(Value::Null, |p| Value::String(p.to_string())));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencli_api::{Pipeline, PipelineNode, Position};
    use std::collections::HashMap;

    fn sample_pipeline(id: &str) -> Pipeline {
        Pipeline {
            id: id.to_string(),
            name: "Test".to_string(),
            description: String::new(),
            nodes: vec![PipelineNode {
                id: "a".to_string(),
                node_type: "calculator_eval".to_string(),
                domain: None,
                label: None,
                position: Position::default(),
                params: HashMap::new(),
            }],
            edges: vec![],
            parameters: vec![],
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips_a_pipeline() {
        let store = Store::open_in_memory().unwrap();
        store.put_pipeline(sample_pipeline("p1")).await.unwrap();
        let fetched = store.get_pipeline("p1").await.unwrap().unwrap();
        assert_eq!(fetched.nodes.len(), 1);
        assert_eq!(fetched.nodes[0].node_type, "calculator_eval");
    }

    #[tokio::test]
    async fn put_is_an_upsert() {
        let store = Store::open_in_memory().unwrap();
        store.put_pipeline(sample_pipeline("p1")).await.unwrap();
        let mut updated = sample_pipeline("p1");
        updated.name = "Renamed".to_string();
        store.put_pipeline(updated).await.unwrap();

        let all = store.list_pipelines().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Renamed");
    }

    #[tokio::test]
    async fn delete_pipeline_reports_whether_a_row_existed() {
        let store = Store::open_in_memory().unwrap();
        store.put_pipeline(sample_pipeline("p1")).await.unwrap();
        assert!(store.delete_pipeline("p1").await.unwrap());
        assert!(!store.delete_pipeline("p1").await.unwrap());
    }

    #[tokio::test]
    async fn episode_round_trips_with_its_linked_pipeline_id() {
        let store = Store::open_in_memory().unwrap();
        let script = EpisodeScript { title: "Pilot".to_string(), ..Default::default() };
        store.put_episode("ep1".to_string(), script, Some("episode-pipeline-ep1".to_string())).await.unwrap();
        let (script, pipeline_id) = store.get_episode("ep1").await.unwrap().unwrap();
        assert_eq!(script.title, "Pilot");
        assert_eq!(pipeline_id.as_deref(), Some("episode-pipeline-ep1"));
    }
}
