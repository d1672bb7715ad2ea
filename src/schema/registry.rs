// src/schema/registry.rs

use std::collections::HashMap;

use super::types::{Column, TableSchema};

/// Declared columns for the green taxi table, in warehouse order.
const GREEN_TAXI: &[(&str, &str)] = &[
    ("VendorID", "FLOAT64"),
    ("lpep_pickup_datetime", "DATETIME"),
    ("lpep_dropoff_datetime", "DATETIME"),
    ("store_and_fwd_flag", "STRING"),
    ("RatecodeID", "INT64"),
    ("PULocationID", "INT64"),
    ("DOLocationID", "INT64"),
    ("passenger_count", "INT64"),
    ("trip_distance", "FLOAT64"),
    ("fare_amount", "FLOAT64"),
    ("extra", "FLOAT64"),
    ("mta_tax", "FLOAT64"),
    ("tip_amount", "FLOAT64"),
    ("tolls_amount", "FLOAT64"),
    ("ehail_fee", "FLOAT64"),
    ("improvement_surcharge", "FLOAT64"),
    ("total_amount", "FLOAT64"),
    ("payment_type", "INT64"),
    ("trip_type", "INT64"),
    ("congestion_surcharge", "FLOAT64"),
];

/// Declared columns for the yellow taxi table, in warehouse order.
const YELLOW_TAXI: &[(&str, &str)] = &[
    ("VendorID", "FLOAT64"),
    ("tpep_pickup_datetime", "DATETIME"),
    ("tpep_dropoff_datetime", "DATETIME"),
    ("passenger_count", "FLOAT64"),
    ("trip_distance", "FLOAT64"),
    ("RatecodeID", "FLOAT64"),
    ("store_and_fwd_flag", "STRING"),
    ("PULocationID", "INT64"),
    ("DOLocationID", "INT64"),
    ("payment_type", "FLOAT64"),
    ("fare_amount", "FLOAT64"),
    ("extra", "FLOAT64"),
    ("mta_tax", "FLOAT64"),
    ("tip_amount", "FLOAT64"),
    ("tolls_amount", "FLOAT64"),
    ("improvement_surcharge", "FLOAT64"),
    ("total_amount", "FLOAT64"),
    ("congestion_surcharge", "FLOAT64"),
];

/// Static table-kind → schema lookup, built once at startup and injected
/// wherever schemas are needed.
pub struct SchemaRegistry {
    schemas: HashMap<String, TableSchema>,
}

impl SchemaRegistry {
    /// Registry covering the built-in table kinds.
    pub fn builtin() -> Self {
        let mut schemas = HashMap::new();
        schemas.insert("green_taxi".to_string(), from_pairs(GREEN_TAXI));
        schemas.insert("yellow_taxi".to_string(), from_pairs(YELLOW_TAXI));
        Self { schemas }
    }

    /// Schema for `table_kind`, or `None` for anything unrecognized.
    /// Callers decide whether an unknown kind is an error.
    pub fn lookup(&self, table_kind: &str) -> Option<&TableSchema> {
        self.schemas.get(table_kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

fn from_pairs(pairs: &[(&str, &str)]) -> TableSchema {
    TableSchema::new(
        pairs
            .iter()
            .map(|(name, ty)| Column::new(name, ty))
            .collect(),
    )
}
