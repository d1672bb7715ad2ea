// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{fs::File, path::Path};

/// One taxi service + year to mirror from the release host.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub service: String,
    pub year: u16,
}

/// Pipeline configuration, loaded once at startup from YAML and passed down
/// explicitly.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Release host holding the gzipped monthly CSV archives.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Local scratch directory for downloads and converted parquet.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// GCS bucket holding converted parquet, one folder per service.
    pub bucket: String,

    /// BigQuery dataset the trip tables live in.
    pub dataset: String,

    /// Appended to the table kind when naming the destination table,
    /// e.g. `_test` → `green_taxi_test`.
    #[serde(default)]
    pub table_suffix: String,

    /// Cast each table to its declared schema before loading.
    #[serde(default = "default_clean")]
    pub clean: bool,

    /// Service/year pairs to fetch.
    #[serde(default)]
    pub sources: Vec<Source>,
}

fn default_base_url() -> String {
    "https://github.com/DataTalksClub/nyc-tlc-data/releases/download".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_clean() -> bool {
    true
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        serde_yaml::from_reader(file)
            .with_context(|| format!("parsing config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let yaml = r#"
bucket: de-week4-data-lake
dataset: ny_taxi
table_suffix: "_test"
clean: false
sources:
  - service: green
    year: 2019
  - service: yellow
    year: 2020
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.bucket, "de-week4-data-lake");
        assert_eq!(cfg.dataset, "ny_taxi");
        assert_eq!(cfg.table_suffix, "_test");
        assert!(!cfg.clean);
        assert_eq!(cfg.sources.len(), 2);
        assert_eq!(
            cfg.sources[0],
            Source {
                service: "green".to_string(),
                year: 2019
            }
        );
        // defaults still fill in
        assert_eq!(cfg.data_dir, "data");
        assert!(cfg.base_url.starts_with("https://"));
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: Config = serde_yaml::from_str("bucket: b\ndataset: d\n").unwrap();
        assert!(cfg.clean);
        assert_eq!(cfg.table_suffix, "");
        assert!(cfg.sources.is_empty());
    }
}
