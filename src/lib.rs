pub mod bq;
pub mod cast;
pub mod config;
pub mod convert;
pub mod fetch;
pub mod gcs;
pub mod ingest;
pub mod schema;
