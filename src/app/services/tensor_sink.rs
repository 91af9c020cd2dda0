//! Numeric batch sink over Parquet.
//!
//! One Float64 frame per grouping-policy output name. Each flush either
//! creates the destination file or loads it, concatenates the new batch in
//! memory and rewrites it whole. The rewrite cost grows with the file; a
//! streaming append format is a substitute if batch counts grow.

use crate::app::models::Record;
use crate::app::services::batch_accumulator::NumericRow;
use crate::config::HexPolicy;
use crate::constants::{
    CH_FIELD_INDEX, RECORD_COLUMNS, RECORD_FIELD_COUNT, SELNBITS_FIELD_INDEX, TY_FIELD_INDEX,
};
use crate::{Error, Result};
use polars::prelude::{
    Column, DataFrame, NamedFrom, ParquetCompression, ParquetReader, ParquetWriter, SerReader,
    Series,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Parquet sink writing one numeric frame per output name
pub struct TensorSink {
    output_dir: PathBuf,
}

impl TensorSink {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    /// Destination path for a grouping output name
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }

    /// Flush one batch into the named output. Creates the file on the
    /// first flush, load-concatenate-rewrites it on later ones. Returns
    /// the total row count of the destination after the flush.
    pub fn flush(&self, file_name: &str, rows: &[NumericRow]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let path = self.output_path(file_name);
        let batch = rows_to_frame(rows)?;

        let mut frame = if path.is_file() {
            let file = std::fs::File::open(&path)
                .map_err(|e| Error::io(format!("Failed to open '{}'", path.display()), e))?;
            let existing = ParquetReader::new(file).finish()?;
            debug!(
                "Appending {} rows to existing tensor of {} rows: {}",
                batch.height(),
                existing.height(),
                path.display()
            );
            existing.vstack(&batch)?
        } else {
            batch
        };

        let file = std::fs::File::create(&path)
            .map_err(|e| Error::io(format!("Failed to create '{}'", path.display()), e))?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut frame)?;

        info!("Saved tensor batch to {}", path.display());
        Ok(frame.height())
    }
}

/// Pack one filtered record into a numeric row. The `ch`/`ty` columns are
/// hex-decoded or zeroed per policy and `selnbits` is always zeroed; any
/// other field without a numeric or hex reading disqualifies the row.
pub fn to_numeric_row(record: &Record, hex_policy: HexPolicy) -> Option<NumericRow> {
    let mut row = [0.0; RECORD_FIELD_COUNT];
    for (index, token) in record.fields.iter().enumerate() {
        row[index] = match index {
            SELNBITS_FIELD_INDEX => 0.0,
            CH_FIELD_INDEX | TY_FIELD_INDEX => match hex_policy {
                HexPolicy::Decode => u32::from_str_radix(token, 16).ok()? as f64,
                HexPolicy::Zero => 0.0,
            },
            _ => crate::app::models::FieldValue::resolve(token).as_f64()?,
        };
    }
    Some(row)
}

fn rows_to_frame(rows: &[NumericRow]) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(RECORD_COLUMNS.len());
    for (index, name) in RECORD_COLUMNS.iter().enumerate() {
        let values: Vec<f64> = rows.iter().map(|row| row[index]).collect();
        columns.push(Series::new((*name).into(), values).into());
    }
    Ok(DataFrame::new(columns)?)
}
