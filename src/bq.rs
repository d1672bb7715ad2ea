// src/bq.rs

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use google_cloud_bigquery::{
    client::{Client, ClientConfig},
    http::{
        job::{
            get::GetJobRequest, CreateDisposition, Job, JobConfiguration, JobConfigurationLoad,
            JobReference, JobState, JobType, WriteDisposition,
        },
        table::{
            SourceFormat, TableFieldSchema, TableFieldType, TableReference,
            TableSchema as BqTableSchema,
        },
    },
};
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::TableSchema;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("load job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },
}

/// Write policy for a load job. Default configuration appends; truncate is
/// never used implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Append,
    Truncate,
}

#[derive(Debug, Clone)]
pub struct LoadReport {
    pub rows_written: i64,
    pub elapsed: Duration,
}

/// Wrapper over the BigQuery client exposing the one operation ingestion
/// needs: a blocking parquet load job with an explicit schema.
pub struct Warehouse {
    client: Client,
    project_id: String,
}

impl Warehouse {
    /// Authenticate with application default credentials. The project id
    /// comes from the credentials.
    pub async fn connect() -> Result<Self> {
        let (config, project_id) = ClientConfig::new_with_auth()
            .await
            .context("authenticating to BigQuery")?;
        let project_id =
            project_id.ok_or_else(|| anyhow!("credentials carry no project id"))?;
        let client = Client::new(config)
            .await
            .context("creating BigQuery client")?;
        Ok(Self { client, project_id })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Load a parquet object from GCS into `dataset.table`, creating the
    /// table if absent, with the declared column schema. Blocks until the
    /// job finishes and returns the rows written.
    pub async fn load_parquet(
        &self,
        dataset: &str,
        table: &str,
        source_uri: &str,
        schema: &TableSchema,
        mode: WriteMode,
    ) -> Result<LoadReport> {
        let started = std::time::Instant::now();
        let job_id = format!("tlcingest_{}_{}", table, Utc::now().timestamp_millis());

        let load = JobConfigurationLoad {
            source_uris: vec![source_uri.to_string()],
            destination_table: TableReference {
                project_id: self.project_id.clone(),
                dataset_id: dataset.to_string(),
                table_id: table.to_string(),
            },
            schema: Some(bq_schema(schema)),
            source_format: Some(SourceFormat::Parquet),
            create_disposition: Some(CreateDisposition::CreateIfNeeded),
            write_disposition: Some(match mode {
                WriteMode::Append => WriteDisposition::WriteAppend,
                WriteMode::Truncate => WriteDisposition::WriteTruncate,
            }),
            ..Default::default()
        };

        let mut job = Job::default();
        job.job_reference = JobReference {
            project_id: self.project_id.clone(),
            job_id: job_id.clone(),
            location: None,
        };
        job.configuration = JobConfiguration {
            job: JobType::Load(load),
            ..Default::default()
        };

        debug!(job_id = %job_id, uri = %source_uri, "submitting load job");
        let mut job = self
            .client
            .job()
            .create(&job)
            .await
            .with_context(|| format!("submitting load job {job_id}"))?;

        while job.status.state != JobState::Done {
            tokio::time::sleep(POLL_INTERVAL).await;
            job = self
                .client
                .job()
                .get(&self.project_id, &job_id, &GetJobRequest::default())
                .await
                .with_context(|| format!("polling load job {job_id}"))?;
        }

        if let Some(err) = job.status.error_result {
            return Err(LoadError::JobFailed {
                job_id,
                message: format!("{err:?}"),
            }
            .into());
        }

        let rows_written = job
            .statistics
            .as_ref()
            .and_then(|s| s.load.as_ref())
            .and_then(|l| l.output_rows)
            .unwrap_or_default();

        let report = LoadReport {
            rows_written,
            elapsed: started.elapsed(),
        };
        info!(
            job_id = %job_id,
            table = %table,
            rows = report.rows_written,
            elapsed = ?report.elapsed,
            "load job done"
        );
        Ok(report)
    }
}

/// Translate a declared table schema into BigQuery field definitions.
fn bq_schema(schema: &TableSchema) -> BqTableSchema {
    let fields = schema
        .columns
        .iter()
        .map(|col| TableFieldSchema {
            name: col.name.clone(),
            data_type: bq_field_type(&col.ty),
            ..Default::default()
        })
        .collect();
    BqTableSchema { fields }
}

fn bq_field_type(ty: &str) -> TableFieldType {
    match ty {
        "FLOAT64" => TableFieldType::Float64,
        "INT64" => TableFieldType::Int64,
        "DATETIME" => TableFieldType::Datetime,
        "STRING" => TableFieldType::String,
        _ => TableFieldType::String,
    }
}
