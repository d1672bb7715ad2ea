// src/schema/local.rs

use arrow::datatypes::{DataType, TimeUnit};

use super::types::{LocalColumn, LocalType, TableSchema};

/// Map a warehouse column type string into the local scalar type.
///
/// Covers:
/// - FLOAT64   → Float
/// - INT64     → Int
/// - STRING    → Str
/// - DATETIME  → Datetime
/// - fallback  → Str
///
/// Total over all inputs; unknown types never fail, they degrade to string.
pub fn map_local_type(ty: &str) -> LocalType {
    match ty {
        "FLOAT64" => LocalType::Float,
        "INT64" => LocalType::Int,
        "STRING" => LocalType::Str,
        "DATETIME" => LocalType::Datetime,
        _ => LocalType::Str,
    }
}

/// Derive the per-column local type spec for a warehouse schema, preserving
/// column order.
pub fn derive_local_types(schema: &TableSchema) -> Vec<LocalColumn> {
    schema
        .columns
        .iter()
        .map(|col| LocalColumn {
            name: col.name.clone(),
            ty: map_local_type(&col.ty),
        })
        .collect()
}

impl LocalType {
    /// The Arrow type a column of this local type is cast to.
    ///
    /// Datetime is a naive timestamp (no timezone) to line up with the
    /// warehouse DATETIME type.
    pub fn data_type(&self) -> DataType {
        match self {
            LocalType::Float => DataType::Float64,
            LocalType::Int => DataType::Int64,
            LocalType::Str => DataType::Utf8,
            LocalType::Datetime => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::Column;

    #[test]
    fn maps_all_known_warehouse_types() {
        assert_eq!(map_local_type("FLOAT64"), LocalType::Float);
        assert_eq!(map_local_type("INT64"), LocalType::Int);
        assert_eq!(map_local_type("STRING"), LocalType::Str);
        assert_eq!(map_local_type("DATETIME"), LocalType::Datetime);
    }

    #[test]
    fn unknown_types_fall_back_to_string() {
        assert_eq!(map_local_type("GEOGRAPHY"), LocalType::Str);
        assert_eq!(map_local_type("bogus"), LocalType::Str);
        assert_eq!(map_local_type(""), LocalType::Str);
    }

    #[test]
    fn derive_preserves_count_order_and_names() {
        let schema = TableSchema::new(vec![
            Column::new("VendorID", "FLOAT64"),
            Column::new("lpep_pickup_datetime", "DATETIME"),
            Column::new("store_and_fwd_flag", "STRING"),
            Column::new("PULocationID", "INT64"),
        ]);

        let spec = derive_local_types(&schema);
        assert_eq!(spec.len(), schema.len());
        let names: Vec<&str> = spec.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "VendorID",
                "lpep_pickup_datetime",
                "store_and_fwd_flag",
                "PULocationID"
            ]
        );
        let tys: Vec<LocalType> = spec.iter().map(|c| c.ty).collect();
        assert_eq!(
            tys,
            vec![
                LocalType::Float,
                LocalType::Datetime,
                LocalType::Str,
                LocalType::Int
            ]
        );
    }
}
