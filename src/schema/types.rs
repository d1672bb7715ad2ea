// src/schema/types.rs

use serde::{Deserialize, Serialize};

/// A single column definition in a warehouse table schema.
///
/// `ty` keeps the warehouse type as its wire string (`FLOAT64`, `INT64`,
/// `STRING`, `DATETIME`); anything else falls back to string handling
/// downstream.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub ty: String,
}

impl Column {
    pub fn new(name: &str, ty: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: ty.to_string(),
        }
    }
}

/// Ordered, immutable column list for one table kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Dataframe-side scalar type a warehouse column is reconciled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalType {
    Float,
    Int,
    Str,
    Datetime,
}

/// One entry of a derived dataframe type spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalColumn {
    pub name: String,
    pub ty: LocalType,
}
