//! Cache statistics reporting
//!
//! Aggregates the single scalar statistic the enclosing search records
//! per run (mean peak cache size across all per-segment caches) and
//! serialises it into an opaque key/value record sink.

use std::io::Write;

use serde::Serialize;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::space::ComputeEngine;

/// Opaque key/value record sink for search output files.
pub trait RecordSink {
    /// Write one named scalar record with a human-readable comment.
    fn write_scalar(&mut self, key: &str, value: f64, comment: &str) -> Result<(), CacheError>;
}

/// One scalar record held by [`JsonRecordSink`].
#[derive(Debug, Clone, Serialize)]
pub struct ScalarRecord {
    /// Record value
    pub value: f64,
    /// Human-readable description
    pub comment: String,
}

/// Record sink collecting scalars into a JSON object.
#[derive(Debug, Default)]
pub struct JsonRecordSink {
    records: serde_json::Map<String, serde_json::Value>,
}

impl JsonRecordSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialise all collected records to a writer as pretty JSON.
    pub fn write_to(&self, writer: &mut dyn Write) -> Result<(), CacheError> {
        serde_json::to_writer_pretty(&mut *writer, &self.records)
            .map_err(CacheError::external)?;
        writer.write_all(b"\n").map_err(CacheError::external)?;
        Ok(())
    }

    /// Collected records as a JSON value.
    pub fn as_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.records.clone())
    }
}

impl RecordSink for JsonRecordSink {
    fn write_scalar(&mut self, key: &str, value: f64, comment: &str) -> Result<(), CacheError> {
        let record = ScalarRecord {
            value,
            comment: comment.to_owned(),
        };
        let json = serde_json::to_value(record).map_err(CacheError::external)?;
        self.records.insert(key.to_owned(), json);
        Ok(())
    }
}

/// Mean peak size attained across a set of caches.
pub fn mean_peak_size<E: ComputeEngine>(caches: &[Cache<E>]) -> Result<f32, CacheError> {
    if caches.is_empty() {
        return Err(CacheError::invalid_argument("no caches to aggregate"));
    }
    let total: f32 = caches.iter().map(|cache| cache.peak_size() as f32).sum();
    Ok(total / caches.len() as f32)
}

/// Write cache statistics into a record sink.
pub fn write_report<E: ComputeEngine>(
    sink: &mut dyn RecordSink,
    caches: &[Cache<E>],
) -> Result<(), CacheError> {
    let mean = mean_peak_size(caches)?;
    sink.write_scalar(
        "cache-mean-peak-size",
        f64::from(mean),
        "mean peak size attained by caches",
    )
}
