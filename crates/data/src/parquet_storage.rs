use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, ArrayRef, Float64Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use factor_platform_core::{FactorOutput, FactorPoint, ResultStorage};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CODE_KEY: &str = "factor.code";
const DATE_KEY: &str = "factor.date";
const DATE_FORMAT: &str = "%Y%m%d";

/// Factor results stored as Parquet files below a root directory.
#[derive(Debug, Clone)]
pub struct ParquetResultStorage {
    root: PathBuf,
}

impl ParquetResultStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Millisecond, None),
            false,
        ),
        Field::new("value", DataType::Float64, false),
    ]))
}

/// Writes factor points to a Parquet file, tagging the file with code and date.
///
/// # Errors
/// Returns an error if the file cannot be created or if writing to the Parquet file fails.
fn write_output(path: &Path, output: &FactorOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let schema = schema();
    let timestamps: Vec<i64> = output
        .points
        .iter()
        .map(|p| p.timestamp.timestamp_millis())
        .collect();
    let values: Vec<f64> = output.points.iter().map(|p| p.value).collect();

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(TimestampMillisecondArray::from(timestamps)) as ArrayRef,
            Arc::new(Float64Array::from(values)) as ArrayRef,
        ],
    )?;

    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![
            KeyValue::new(CODE_KEY.to_string(), output.code.clone()),
            KeyValue::new(
                DATE_KEY.to_string(),
                output.date.format(DATE_FORMAT).to_string(),
            ),
        ]))
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}

fn read_output(path: &Path) -> Result<FactorOutput> {
    let file =
        File::open(path).with_context(|| format!("Failed to open result: {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let metadata = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .cloned()
        .unwrap_or_default();
    let lookup = |key: &str| {
        metadata
            .iter()
            .find(|kv| kv.key == key)
            .and_then(|kv| kv.value.clone())
            .ok_or_else(|| anyhow!("{}: missing {key} metadata", path.display()))
    };
    let code = lookup(CODE_KEY)?;
    let date = NaiveDate::parse_from_str(&lookup(DATE_KEY)?, DATE_FORMAT)?;

    let mut points = Vec::new();
    for batch in builder.build()? {
        let batch = batch?;
        let timestamps = batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .context("timestamp column has unexpected type")?;
        let values = batch
            .column(1)
            .as_any()
            .downcast_ref::<Float64Array>()
            .context("value column has unexpected type")?;

        for row in 0..batch.num_rows() {
            let millis = timestamps.value(row);
            let timestamp = DateTime::from_timestamp_millis(millis)
                .with_context(|| format!("timestamp out of range: {millis}"))?;
            points.push(FactorPoint {
                timestamp,
                value: values.value(row),
            });
        }
    }

    Ok(FactorOutput { code, date, points })
}

#[async_trait]
impl ResultStorage for ParquetResultStorage {
    async fn put(&self, path: &str, output: &FactorOutput) -> Result<bool> {
        let target = self.resolve(path);
        let output = output.clone();
        let written = tokio::task::spawn_blocking(move || write_output(&target, &output)).await?;

        match written {
            Ok(()) => {
                tracing::debug!(path, "factor result written");
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "failed to write factor result");
                Ok(false)
            }
        }
    }

    async fn get(&self, path: &str) -> Result<FactorOutput> {
        let target = self.resolve(path);
        tokio::task::spawn_blocking(move || read_output(&target)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample_output() -> FactorOutput {
        FactorOutput {
            code: "600000.SH".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            points: vec![
                FactorPoint {
                    timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 31, 0).unwrap(),
                    value: 48.5,
                },
                FactorPoint {
                    timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 32, 0).unwrap(),
                    value: 51.25,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_put_creates_nested_file_and_get_reads_it() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ParquetResultStorage::new(dir.path());
        let output = sample_output();
        let path = "stock/RMI/20240301/600000.SH.parquet";

        assert!(storage.put(path, &output).await.unwrap());
        assert!(dir.path().join(path).exists());

        let loaded = storage.get(path).await.unwrap();
        assert_eq!(loaded, output);
    }

    #[tokio::test]
    async fn test_put_reports_failure_when_path_is_blocked() {
        let dir = tempfile::tempdir().unwrap();
        // A file where a directory is needed.
        std::fs::write(dir.path().join("stock"), b"").unwrap();
        let storage = ParquetResultStorage::new(dir.path());

        let written = storage
            .put("stock/RMI/20240301/600000.SH.parquet", &sample_output())
            .await
            .unwrap();
        assert!(!written);
    }

    #[tokio::test]
    async fn test_get_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = ParquetResultStorage::new(dir.path());

        assert!(storage.get("missing.parquet").await.is_err());
    }
}
