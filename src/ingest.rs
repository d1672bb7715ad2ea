// src/ingest.rs

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    bq::{LoadReport, Warehouse, WriteMode},
    cast::cast_batch,
    config::Config,
    convert::write_parquet_bytes,
    gcs::Gcs,
    schema::{derive_local_types, SchemaRegistry},
};

/// Folders that never reach the warehouse. `fhv` has no declared schema;
/// `staging` holds this pipeline's own cast output.
const SKIPPED_FOLDERS: &[&str] = &["fhv", "staging"];

const STAGING_PREFIX: &str = "staging";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no schema registered for table kind {0:?}")]
    SchemaNotFound(String),
}

/// Result of one object's ingest attempt. Failures are captured here rather
/// than aborting the batch.
pub struct ObjectOutcome {
    pub object: String,
    pub table: String,
    pub result: Result<LoadReport>,
}

pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
    pub rows_written: i64,
}

/// `folder/name` within the bucket. Anything not exactly two segments deep
/// is not one of ours.
pub fn split_object_path(path: &str) -> Option<(&str, &str)> {
    let (folder, name) = path.split_once('/')?;
    if folder.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((folder, name))
}

/// Folder naming convention drives the table kind: `green` → `green_taxi`.
pub fn resolve_table_kind(folder: &str) -> String {
    format!("{folder}_taxi")
}

pub fn should_skip(folder: &str, name: &str) -> bool {
    SKIPPED_FOLDERS.contains(&folder) || !name.ends_with(".parquet")
}

/// Where a load job reads from, decided up front by the `clean` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// The object's own URI; column types stay exactly as read and the
    /// warehouse enforces the declared schema on its own.
    Raw { uri: String },
    /// Cast output, staged as a new object before loading.
    Staged { object: String, uri: String },
}

impl LoadSource {
    pub fn uri(&self) -> &str {
        match self {
            LoadSource::Raw { uri } => uri,
            LoadSource::Staged { uri, .. } => uri,
        }
    }
}

pub fn plan_load_source(clean: bool, bucket: &str, folder: &str, name: &str) -> LoadSource {
    let object = format!("{folder}/{name}");
    if clean {
        let staged = format!("{STAGING_PREFIX}/{object}");
        LoadSource::Staged {
            uri: format!("gs://{bucket}/{staged}"),
            object: staged,
        }
    } else {
        LoadSource::Raw {
            uri: format!("gs://{bucket}/{object}"),
        }
    }
}

pub fn summarize(outcomes: &[ObjectOutcome]) -> Summary {
    let mut summary = Summary {
        succeeded: 0,
        failed: 0,
        rows_written: 0,
    };
    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                summary.succeeded += 1;
                summary.rows_written += report.rows_written;
            }
            Err(_) => summary.failed += 1,
        }
    }
    summary
}

/// Sequential driver over every discovered source object. One object is
/// fully read, optionally cast, and loaded before the next begins; a failed
/// object is recorded and the run moves on.
pub struct Ingestor<'a> {
    pub gcs: &'a Gcs,
    pub warehouse: &'a Warehouse,
    pub registry: &'a SchemaRegistry,
    pub cfg: &'a Config,
}

impl Ingestor<'_> {
    pub async fn run(&self) -> Result<Vec<ObjectOutcome>> {
        let objects = self.gcs.list(&self.cfg.bucket).await?;

        let mut outcomes = Vec::new();
        for path in objects {
            let Some((folder, name)) = split_object_path(&path) else {
                debug!(object = %path, "ignoring object outside folder convention");
                continue;
            };
            if should_skip(folder, name) {
                debug!(object = %path, "skipping");
                continue;
            }

            let kind = resolve_table_kind(folder);
            let table = format!("{}{}", kind, self.cfg.table_suffix);
            info!(object = %path, table = %table, "ingesting");

            let result = self.ingest_object(folder, name, &kind, &table).await;
            if let Err(e) = &result {
                error!(object = %path, error = %e, "ingest failed");
            }
            outcomes.push(ObjectOutcome {
                object: path,
                table,
                result,
            });
        }

        let summary = summarize(&outcomes);
        if summary.failed > 0 {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                rows = summary.rows_written,
                "ingest finished with failures"
            );
        } else {
            info!(
                succeeded = summary.succeeded,
                rows = summary.rows_written,
                "ingest finished"
            );
        }
        Ok(outcomes)
    }

    #[instrument(level = "info", skip(self), fields(bucket = %self.cfg.bucket))]
    async fn ingest_object(
        &self,
        folder: &str,
        name: &str,
        kind: &str,
        table: &str,
    ) -> Result<LoadReport> {
        let schema = self
            .registry
            .lookup(kind)
            .ok_or_else(|| IngestError::SchemaNotFound(kind.to_string()))?;

        let object = format!("{folder}/{name}");
        let batch = self.gcs.read_parquet(&self.cfg.bucket, &object).await?;
        debug!(rows = batch.num_rows(), schema = ?batch.schema().fields(), "read source object");

        let source = plan_load_source(self.cfg.clean, &self.cfg.bucket, folder, name);
        if let LoadSource::Staged { object: staged, .. } = &source {
            let spec = derive_local_types(schema);
            let cast = cast_batch(&batch, &spec)
                .with_context(|| format!("casting {object} to {kind} schema"))?;
            debug!(schema = ?cast.schema().fields(), "cast to declared types");

            let bytes = write_parquet_bytes(&cast)?;
            self.gcs.upload(&self.cfg.bucket, staged, bytes).await?;
        }

        self.warehouse
            .load_parquet(&self.cfg.dataset, table, source.uri(), schema, WriteMode::Append)
            .await
    }
}
