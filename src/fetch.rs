// src/fetch.rs

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use futures::future::join_all;
use reqwest::Client;
use tokio::{fs, sync::Semaphore, time::Instant};
use tracing::{error, info};
use url::Url;

use crate::{config::Config, convert, gcs::Gcs};

/// Parallel downloads per service/year; conversion is the heavy part so
/// there is no point going wider.
const DOWNLOAD_WIDTH: usize = 3;

/// `{base}/{service}/{service}_tripdata_{year}-{month:02}.csv.gz`
pub fn archive_url(base: &str, service: &str, year: u16, month: u32) -> String {
    format!(
        "{}/{}/{}_tripdata_{}-{:02}.csv.gz",
        base.trim_end_matches('/'),
        service,
        service,
        year,
        month
    )
}

/// Download one archive into `dest_dir`, keeping the filename from the URL.
pub async fn download_archive(
    client: &Client,
    url_str: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let url = Url::parse(url_str)?;
    let filename = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .context("archive URL has no filename")?;
    let dest_path = dest_dir.as_ref().join(filename);

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let resp = client.get(url.as_str()).send().await?.error_for_status()?;
    let body = resp.bytes().await?;
    fs::write(&dest_path, &body).await?;

    Ok(dest_path)
}

/// Mirror one service/year to GCS: download each month's archive, convert it
/// to parquet, and upload under `{service}/` in the bucket. Months run on a
/// bounded worker pool; a failed month is logged and does not stop the rest.
pub async fn mirror_service_year(
    client: &Client,
    gcs: &Arc<Gcs>,
    cfg: &Config,
    service: &str,
    year: u16,
) -> Result<()> {
    let service_dir = PathBuf::from(&cfg.data_dir).join(service);
    fs::create_dir_all(&service_dir)
        .await
        .with_context(|| format!("creating {}", service_dir.display()))?;

    let year_start = Instant::now();
    let sem = Arc::new(Semaphore::new(DOWNLOAD_WIDTH));
    let mut handles = Vec::with_capacity(12);

    for month in 1..=12u32 {
        let client = client.clone();
        let gcs = Arc::clone(gcs);
        let sem = Arc::clone(&sem);
        let url = archive_url(&cfg.base_url, service, year, month);
        let service = service.to_string();
        let bucket = cfg.bucket.clone();
        let service_dir = service_dir.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.expect("semaphore closed");
            let start = Instant::now();
            info!(service = %service, year, month, "downloading archive");

            let archive = download_archive(&client, &url, &service_dir).await?;

            // CSV parsing + parquet writing is CPU-bound
            let parquet = tokio::task::spawn_blocking({
                let archive = archive.clone();
                move || convert::csv_gz_to_parquet(&archive)
            })
            .await??;

            let object = format!(
                "{}/{}",
                service,
                parquet.file_name().unwrap_or_default().to_string_lossy()
            );
            gcs.upload_file(&bucket, &object, &parquet).await?;

            info!(
                service = %service,
                year,
                month,
                object = %object,
                elapsed = ?start.elapsed(),
                "month mirrored"
            );
            Ok::<_, anyhow::Error>(())
        }));
    }

    let mut failed = 0usize;
    for (month, result) in (1..=12u32).zip(join_all(handles).await) {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failed += 1;
                error!(service, year, month, error = %e, "month failed");
            }
            Err(e) => {
                failed += 1;
                error!(service, year, month, error = %e, "month task panicked");
            }
        }
    }

    info!(
        service,
        year,
        failed,
        elapsed = ?year_start.elapsed(),
        "service year mirrored"
    );
    Ok(())
}

/// Run the fetch pipeline for every configured source.
pub async fn run(client: &Client, gcs: &Arc<Gcs>, cfg: &Config) -> Result<()> {
    fs::create_dir_all(&cfg.data_dir)
        .await
        .with_context(|| format!("creating {}", cfg.data_dir))?;

    for source in &cfg.sources {
        mirror_service_year(client, gcs, cfg, &source.service, source.year).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_url_zero_pads_month() {
        assert_eq!(
            archive_url(
                "https://github.com/DataTalksClub/nyc-tlc-data/releases/download",
                "green",
                2019,
                3
            ),
            "https://github.com/DataTalksClub/nyc-tlc-data/releases/download/green/green_tripdata_2019-03.csv.gz"
        );
    }

    #[test]
    fn archive_url_tolerates_trailing_slash() {
        assert_eq!(
            archive_url("https://host/base/", "yellow", 2020, 12),
            "https://host/base/yellow/yellow_tripdata_2020-12.csv.gz"
        );
    }
}
