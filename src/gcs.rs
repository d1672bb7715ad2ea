// src/gcs.rs

use std::path::Path;

use anyhow::{Context, Result};
use arrow::{compute::concat_batches, record_batch::RecordBatch};
use bytes::Bytes;
use google_cloud_storage::{
    client::{Client, ClientConfig},
    http::objects::{
        download::Range,
        get::GetObjectRequest,
        list::ListObjectsRequest,
        upload::{Media, UploadObjectRequest, UploadType},
    },
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, info};

/// Thin wrapper over the GCS client covering the three operations the
/// pipelines need: list, download-as-table, upload.
pub struct Gcs {
    client: Client,
}

impl Gcs {
    /// Authenticate with application default credentials.
    pub async fn connect() -> Result<Self> {
        let config = ClientConfig::default()
            .with_auth()
            .await
            .context("authenticating to GCS")?;
        Ok(Self {
            client: Client::new(config),
        })
    }

    /// All object names in the bucket, following pagination.
    pub async fn list(&self, bucket: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_objects(&ListObjectsRequest {
                    bucket: bucket.to_string(),
                    page_token: page_token.take(),
                    ..Default::default()
                })
                .await
                .with_context(|| format!("listing gs://{bucket}"))?;

            if let Some(items) = resp.items {
                names.extend(items.into_iter().map(|o| o.name));
            }
            match resp.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(bucket, objects = names.len(), "listed bucket");
        Ok(names)
    }

    pub async fn download(&self, bucket: &str, object: &str) -> Result<Vec<u8>> {
        self.client
            .download_object(
                &GetObjectRequest {
                    bucket: bucket.to_string(),
                    object: object.to_string(),
                    ..Default::default()
                },
                &Range::default(),
            )
            .await
            .with_context(|| format!("downloading gs://{bucket}/{object}"))
    }

    /// Download a parquet object and decode it into a single record batch.
    pub async fn read_parquet(&self, bucket: &str, object: &str) -> Result<RecordBatch> {
        let data = self.download(bucket, object).await?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(data))
            .with_context(|| format!("opening parquet gs://{bucket}/{object}"))?;
        let schema = builder.schema().clone();
        let reader = builder.build().context("building parquet reader")?;

        let batches: Vec<RecordBatch> = reader
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("decoding parquet gs://{bucket}/{object}"))?;
        if batches.is_empty() {
            return Ok(RecordBatch::new_empty(schema));
        }

        concat_batches(&schema, &batches).context("concatenating batches")
    }

    pub async fn upload(&self, bucket: &str, object: &str, data: Vec<u8>) -> Result<()> {
        let size = data.len();
        let upload_type = UploadType::Simple(Media::new(object.to_string()));
        self.client
            .upload_object(
                &UploadObjectRequest {
                    bucket: bucket.to_string(),
                    ..Default::default()
                },
                data,
                &upload_type,
            )
            .await
            .with_context(|| format!("uploading gs://{bucket}/{object}"))?;

        info!(bucket, object, bytes = size, "uploaded object");
        Ok(())
    }

    pub async fn upload_file(&self, bucket: &str, object: &str, path: &Path) -> Result<()> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        self.upload(bucket, object, data).await
    }
}
