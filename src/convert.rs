// src/convert.rs

use std::{
    fs::File,
    io::{Cursor, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use arrow::{
    csv::{reader::Format, ReaderBuilder},
    record_batch::RecordBatch,
};
use flate2::read::GzDecoder;
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use tracing::debug;

const CSV_BATCH_SIZE: usize = 65_536;
const INFER_ROWS: usize = 1_000;

/// Convert a gzipped CSV archive into a parquet file next to it, with column
/// types inferred from the data. Returns the parquet path.
pub fn csv_gz_to_parquet(src: &Path) -> Result<PathBuf> {
    let dest = parquet_name(src);

    let csv = decode_gzip(src)?;
    debug!(src = %src.display(), bytes = csv.len(), "decompressed archive");

    let format = Format::default().with_header(true);
    let (schema, _) = format
        .infer_schema(Cursor::new(&csv), Some(INFER_ROWS))
        .with_context(|| format!("inferring CSV schema for {}", src.display()))?;
    let schema = Arc::new(schema);

    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(CSV_BATCH_SIZE)
        .build(Cursor::new(&csv))
        .context("creating CSV reader")?;

    let out = File::create(&dest)
        .with_context(|| format!("creating parquet file {}", dest.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer =
        ArrowWriter::try_new(out, schema, Some(props)).context("creating parquet writer")?;

    for batch in reader {
        let batch = batch.context("reading CSV batch")?;
        writer.write(&batch).context("writing batch to parquet")?;
    }
    writer.close().context("closing parquet writer")?;

    Ok(dest)
}

/// Serialize a single batch to parquet bytes, for staging cast output in
/// object storage.
pub fn write_parquet_bytes(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let cursor = Cursor::new(&mut buffer);

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(cursor, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;

    Ok(buffer)
}

/// `green_tripdata_2019-01.csv.gz` → `green_tripdata_2019-01.parquet`
pub fn parquet_name(src: &Path) -> PathBuf {
    let stem = src
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = stem
        .strip_suffix(".csv.gz")
        .map(str::to_string)
        .unwrap_or(stem);
    src.with_file_name(format!("{stem}.parquet"))
}

fn decode_gzip(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut decoder = GzDecoder::new(file);
    let mut buf = Vec::new();
    decoder
        .read_to_end(&mut buf)
        .with_context(|| format!("decompressing {}", path.display()))?;
    if buf.is_empty() {
        return Err(anyhow!("{} decompressed to zero bytes", path.display()));
    }
    Ok(buf)
}
