use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Raw market data for one instrument on one trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSeries {
    pub code: String,
    pub date: NaiveDate,
    /// Sorted by timestamp, ascending.
    pub bars: Vec<Bar>,
}

impl MarketSeries {
    #[must_use]
    pub fn new(code: impl Into<String>, date: NaiveDate, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self {
            code: code.into(),
            date,
            bars,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Values produced by a factor run for one instrument and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorOutput {
    pub code: String,
    pub date: NaiveDate,
    pub points: Vec<FactorPoint>,
}

impl FactorOutput {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }
}

/// Parses a trading date given as `YYYY-MM-DD` or `YYYYMMDD`.
///
/// # Errors
/// Returns an error if the input is neither format.
pub fn parse_trading_date(input: &str) -> Result<NaiveDate> {
    let compact: String = input.trim().chars().filter(|c| *c != '-').collect();
    if compact.len() != 8 || !compact.chars().all(|c| c.is_ascii_digit()) {
        bail!("Invalid trading date '{input}'. Use YYYY-MM-DD or YYYYMMDD");
    }

    NaiveDate::parse_from_str(&compact, "%Y%m%d")
        .with_context(|| format!("Invalid trading date '{input}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn bar(hour: u32, close: Decimal) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2025, 3, 3, hour, 0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(10),
        }
    }

    #[test]
    fn test_parse_trading_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        assert_eq!(parse_trading_date("2025-03-03").unwrap(), expected);
        assert_eq!(parse_trading_date("20250303").unwrap(), expected);
        assert_eq!(parse_trading_date(" 20250303 ").unwrap(), expected);
    }

    #[test]
    fn test_parse_trading_date_rejects_garbage() {
        assert!(parse_trading_date("2025/03/03").is_err());
        assert!(parse_trading_date("20251340").is_err());
        assert!(parse_trading_date("").is_err());
    }

    #[test]
    fn test_market_series_sorts_bars() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let series = MarketSeries::new("600000.SH", date, vec![bar(11, dec!(2)), bar(10, dec!(1))]);

        assert_eq!(series.bars[0].close, dec!(1));
        assert_eq!(series.bars[1].close, dec!(2));
    }
}
