use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use csv::Writer;
use factor_platform_core::{Bar, MarketDataSource, MarketSeries};
use rust_decimal::Decimal;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Market data read from a directory of per-day CSV files.
///
/// Layout: `{root}/{code}/{YYYYMMDD}.csv`
/// Format: timestamp,code,open,high,low,close,volume
#[derive(Debug, Clone)]
pub struct CsvMarketData {
    root: PathBuf,
}

impl CsvMarketData {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn path_for(&self, code: &str, date: NaiveDate) -> PathBuf {
        self.root
            .join(code)
            .join(format!("{}.csv", date.format("%Y%m%d")))
    }

    /// Writes a series in the layout `fetch` reads, creating directories.
    ///
    /// # Errors
    /// Returns error if the file cannot be created or writing fails
    pub fn write_series(&self, series: &MarketSeries) -> Result<PathBuf> {
        let path = self.path_for(&series.code, series.date);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = File::create(&path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        let mut writer = Writer::from_writer(file);
        writer.write_record(["timestamp", "code", "open", "high", "low", "close", "volume"])?;

        for bar in &series.bars {
            writer.write_record(&[
                bar.timestamp.to_rfc3339(),
                series.code.clone(),
                bar.open.to_string(),
                bar.high.to_string(),
                bar.low.to_string(),
                bar.close.to_string(),
                bar.volume.to_string(),
            ])?;
        }

        writer.flush()?;
        Ok(path)
    }
}

fn read_bars(path: &Path) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open market data: {}", path.display()))?;
    let mut bars = Vec::new();

    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let bar = parse_bar(&record)
            .with_context(|| format!("{}: invalid row {}", path.display(), line + 2))?;
        bars.push(bar);
    }

    Ok(bars)
}

fn parse_bar(record: &csv::StringRecord) -> Result<Bar> {
    let field = |index: usize| record.get(index).context("missing column");

    let timestamp: DateTime<Utc> = field(0)?.parse()?;
    Ok(Bar {
        timestamp,
        open: Decimal::from_str(field(2)?)?,
        high: Decimal::from_str(field(3)?)?,
        low: Decimal::from_str(field(4)?)?,
        close: Decimal::from_str(field(5)?)?,
        volume: Decimal::from_str(field(6)?)?,
    })
}

#[async_trait]
impl MarketDataSource for CsvMarketData {
    async fn fetch(&self, code: &str, date: NaiveDate) -> Result<MarketSeries> {
        let path = self.path_for(code, date);
        let bars = tokio::task::spawn_blocking(move || read_bars(&path)).await??;

        tracing::debug!(code, %date, bars = bars.len(), "market data loaded");
        Ok(MarketSeries::new(code, date, bars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar(minute: u32, close: Decimal) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap(),
            open: close,
            high: close + dec!(0.5),
            low: close - dec!(0.5),
            close,
            volume: dec!(1000),
        }
    }

    #[tokio::test]
    async fn test_fetch_reads_sorted_bars() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvMarketData::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        // Written out of order on purpose.
        let series = MarketSeries {
            code: "600000.SH".to_string(),
            date,
            bars: vec![bar(32, dec!(10.20)), bar(31, dec!(10.10))],
        };
        let path = source.write_series(&series).unwrap();
        assert!(path.ends_with("600000.SH/20240301.csv"));

        let loaded = source.fetch("600000.SH", date).await.unwrap();

        assert_eq!(loaded.code, "600000.SH");
        assert_eq!(loaded.bars.len(), 2);
        assert_eq!(loaded.bars[0].close, dec!(10.10));
        assert_eq!(loaded.bars[1].close, dec!(10.20));
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvMarketData::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        assert!(source.fetch("000001.SZ", date).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_price() {
        let dir = tempfile::tempdir().unwrap();
        let source = CsvMarketData::new(dir.path());
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let path = source.path_for("000001.SZ", date);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "timestamp,code,open,high,low,close,volume\n\
             2024-03-01T09:31:00Z,000001.SZ,1,1,1,abc,100\n",
        )
        .unwrap();

        let err = source.fetch("000001.SZ", date).await.unwrap_err();
        assert!(format!("{err:#}").contains("invalid row 2"));
    }
}
