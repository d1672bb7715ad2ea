// src/cast.rs

use std::sync::Arc;

use arrow::{
    array::{Array, ArrayRef, StringArray, TimestampMicrosecondBuilder},
    compute::kernels::cast::{cast_with_options, CastOptions},
    datatypes::{DataType, Field, Schema, TimeUnit},
    error::ArrowError,
    record_batch::RecordBatch,
    util::display::FormatOptions,
};
use chrono::NaiveDate;
use thiserror::Error;

use crate::schema::{LocalColumn, LocalType};

#[derive(Debug, Error)]
pub enum CastError {
    #[error("column {0:?} named in spec is absent from the input table")]
    MissingColumn(String),

    #[error("column {column:?}: cannot coerce to {target:?}")]
    Coerce {
        column: String,
        target: LocalType,
        #[source]
        source: ArrowError,
    },

    #[error("column {column:?}: unparseable datetime value {value:?}")]
    Datetime { column: String, value: String },

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

/// Cast every column named in `spec` to its target local type, leaving
/// columns outside the spec untouched. Returns a new batch; the input is
/// never mutated.
///
/// Non-datetime coercions go through the Arrow cast kernel with `safe`
/// disabled, so an uncoercible value (e.g. non-numeric text into a float
/// column) is an error rather than a silent null. Datetime columns holding
/// strings are parsed with permissive format inference.
pub fn cast_batch(batch: &RecordBatch, spec: &[LocalColumn]) -> Result<RecordBatch, CastError> {
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    let mut fields: Vec<Arc<Field>> = batch.schema().fields().iter().cloned().collect();

    for entry in spec {
        let idx = batch
            .schema()
            .index_of(&entry.name)
            .map_err(|_| CastError::MissingColumn(entry.name.clone()))?;

        let src = &columns[idx];
        let out = match entry.ty {
            LocalType::Datetime => cast_datetime_column(&entry.name, src)?,
            _ => cast_scalar_column(entry, src)?,
        };

        fields[idx] = Arc::new(Field::new(&entry.name, out.data_type().clone(), true));
        columns[idx] = out;
    }

    let schema = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn cast_scalar_column(entry: &LocalColumn, src: &ArrayRef) -> Result<ArrayRef, CastError> {
    let target = entry.ty.data_type();
    if src.data_type() == &target {
        return Ok(src.clone());
    }

    let options = CastOptions {
        safe: false,
        format_options: FormatOptions::default(),
    };
    cast_with_options(src, &target, &options).map_err(|source| CastError::Coerce {
        column: entry.name.clone(),
        target: entry.ty,
        source,
    })
}

fn cast_datetime_column(name: &str, src: &ArrayRef) -> Result<ArrayRef, CastError> {
    let target = DataType::Timestamp(TimeUnit::Microsecond, None);
    if src.data_type() == &target {
        return Ok(src.clone());
    }

    match src.as_any().downcast_ref::<StringArray>() {
        Some(sarr) => {
            let mut b = TimestampMicrosecondBuilder::with_capacity(sarr.len());
            for opt in sarr.iter() {
                match opt {
                    None => b.append_null(),
                    Some(raw) => {
                        let micros =
                            parse_datetime_micros(raw).ok_or_else(|| CastError::Datetime {
                                column: name.to_string(),
                                value: raw.to_string(),
                            })?;
                        b.append_value(micros);
                    }
                }
            }
            Ok(Arc::new(b.finish()) as ArrayRef)
        }
        // Non-string sources (date32, other timestamp units, ...) go through
        // the cast kernel.
        None => {
            let options = CastOptions {
                safe: false,
                format_options: FormatOptions::default(),
            };
            cast_with_options(src, &target, &options).map_err(|source| CastError::Coerce {
                column: name.to_string(),
                target: LocalType::Datetime,
                source,
            })
        }
    }
}

/// Parse a datetime string into microseconds since epoch, trying the formats
/// that show up in the trip data feeds. Date-only values land on midnight.
pub fn parse_datetime_micros(raw: &str) -> Option<i64> {
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y/%m/%d %H:%M:%S",
    ];

    let s = raw.trim();
    for fmt in FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_micros());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array, TimestampMicrosecondArray};

    fn batch_of(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, arr)| Field::new(*name, arr.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, arr)| arr).collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    fn float_spec(name: &str) -> Vec<LocalColumn> {
        vec![LocalColumn {
            name: name.to_string(),
            ty: LocalType::Float,
        }]
    }

    #[test]
    fn numeric_text_casts_to_float() {
        let batch = batch_of(vec![(
            "trip_distance",
            Arc::new(StringArray::from(vec!["1.2", "3.4"])) as ArrayRef,
        )]);

        let cast = cast_batch(&batch, &float_spec("trip_distance")).unwrap();
        let col = cast
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(col.value(0), 1.2);
        assert_eq!(col.value(1), 3.4);
    }

    #[test]
    fn cast_is_idempotent() {
        let spec = vec![
            LocalColumn {
                name: "fare_amount".to_string(),
                ty: LocalType::Float,
            },
            LocalColumn {
                name: "pickup".to_string(),
                ty: LocalType::Datetime,
            },
        ];
        let batch = batch_of(vec![
            (
                "fare_amount",
                Arc::new(StringArray::from(vec!["10.5", "2.0"])) as ArrayRef,
            ),
            (
                "pickup",
                Arc::new(StringArray::from(vec![
                    "2019-01-01 00:46:40",
                    "2019-01-01 01:00:00",
                ])) as ArrayRef,
            ),
        ]);

        let once = cast_batch(&batch, &spec).unwrap();
        let twice = cast_batch(&once, &spec).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_spec_column_is_an_error() {
        let batch = batch_of(vec![(
            "trip_distance",
            Arc::new(StringArray::from(vec!["1.2"])) as ArrayRef,
        )]);

        let err = cast_batch(&batch, &float_spec("total_amount")).unwrap_err();
        assert!(matches!(err, CastError::MissingColumn(ref c) if c == "total_amount"));
    }

    #[test]
    fn uncoercible_value_is_an_error() {
        let batch = batch_of(vec![(
            "trip_distance",
            Arc::new(StringArray::from(vec!["1.2", "not a number"])) as ArrayRef,
        )]);

        let err = cast_batch(&batch, &float_spec("trip_distance")).unwrap_err();
        assert!(matches!(err, CastError::Coerce { ref column, .. } if column == "trip_distance"));
    }

    #[test]
    fn datetime_strings_parse_to_timestamps() {
        let batch = batch_of(vec![(
            "lpep_pickup_datetime",
            Arc::new(StringArray::from(vec![
                Some("2019-01-01 00:46:40"),
                None,
                Some("2019-01-01"),
            ])) as ArrayRef,
        )]);
        let spec = vec![LocalColumn {
            name: "lpep_pickup_datetime".to_string(),
            ty: LocalType::Datetime,
        }];

        let cast = cast_batch(&batch, &spec).unwrap();
        let col = cast
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        let expected = chrono::NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 46, 40)
            .unwrap()
            .and_utc()
            .timestamp_micros();
        assert_eq!(col.value(0), expected);
        assert!(col.is_null(1));
        // date-only rounds down to midnight
        assert_eq!(col.value(2), expected - 2800 * 1_000_000);
    }

    #[test]
    fn unparseable_datetime_is_an_error() {
        let batch = batch_of(vec![(
            "pickup",
            Arc::new(StringArray::from(vec!["soon"])) as ArrayRef,
        )]);
        let spec = vec![LocalColumn {
            name: "pickup".to_string(),
            ty: LocalType::Datetime,
        }];

        let err = cast_batch(&batch, &spec).unwrap_err();
        assert!(matches!(err, CastError::Datetime { ref value, .. } if value == "soon"));
    }

    #[test]
    fn columns_outside_spec_pass_through_unchanged() {
        let batch = batch_of(vec![
            (
                "trip_distance",
                Arc::new(StringArray::from(vec!["1.2"])) as ArrayRef,
            ),
            (
                "congestion_zone",
                Arc::new(Int64Array::from(vec![7])) as ArrayRef,
            ),
        ]);

        let cast = cast_batch(&batch, &float_spec("trip_distance")).unwrap();
        assert_eq!(cast.column(1).data_type(), &DataType::Int64);
        assert_eq!(
            cast.schema().field(1).name(),
            batch.schema().field(1).name()
        );
    }

    #[test]
    fn int_casts_widen_and_narrow() {
        let batch = batch_of(vec![
            (
                "passenger_count",
                Arc::new(Float64Array::from(vec![2.0, 1.0])) as ArrayRef,
            ),
            (
                "PULocationID",
                Arc::new(StringArray::from(vec!["74", "75"])) as ArrayRef,
            ),
        ]);
        let spec = vec![
            LocalColumn {
                name: "passenger_count".to_string(),
                ty: LocalType::Int,
            },
            LocalColumn {
                name: "PULocationID".to_string(),
                ty: LocalType::Int,
            },
        ];

        let cast = cast_batch(&batch, &spec).unwrap();
        let passengers = cast
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(passengers.value(0), 2);
        let locations = cast
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(locations.value(1), 75);
    }
}
