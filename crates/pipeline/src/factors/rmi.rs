//! Relative Momentum Index.
//!
//! RSI generalised to compare each close with the close `momentum` bars
//! earlier instead of the previous bar.

use anyhow::{bail, Context, Result};
use factor_platform_core::{Factor, FactorOutput, FactorPoint, MarketSeries};
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::Value;

pub const NAME: &str = "RMI";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
struct RmiParams {
    period: usize,
    momentum: usize,
}

impl Default for RmiParams {
    fn default() -> Self {
        Self {
            period: 14,
            momentum: 5,
        }
    }
}

pub struct RmiFactor {
    params: RmiParams,
    series: Option<MarketSeries>,
    output: Option<FactorOutput>,
}

impl Default for RmiFactor {
    fn default() -> Self {
        Self::new()
    }
}

impl RmiFactor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: RmiParams::default(),
            series: None,
            output: None,
        }
    }

    #[must_use]
    pub fn period(&self) -> usize {
        self.params.period
    }

    #[must_use]
    pub fn momentum(&self) -> usize {
        self.params.momentum
    }
}

fn rmi_value(up: f64, down: f64) -> f64 {
    let total = up + down;
    if total == 0.0 {
        50.0
    } else {
        100.0 * up / total
    }
}

/// Returns `(bar index, value)` pairs, one per bar once `period` moves exist.
fn compute(closes: &[f64], period: usize, momentum: usize) -> Vec<(usize, f64)> {
    if closes.len() < momentum + period {
        return Vec::new();
    }

    let moves: Vec<(f64, f64)> = (momentum..closes.len())
        .map(|i| {
            let change = closes[i] - closes[i - momentum];
            (change.max(0.0), (-change).max(0.0))
        })
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let n = period as f64;
    let mut up = moves[..period].iter().map(|m| m.0).sum::<f64>() / n;
    let mut down = moves[..period].iter().map(|m| m.1).sum::<f64>() / n;

    let first = momentum + period - 1;
    let mut values = Vec::with_capacity(closes.len() - first);
    values.push((first, rmi_value(up, down)));

    for (offset, (gain, loss)) in moves[period..].iter().enumerate() {
        up = (up * (n - 1.0) + gain) / n;
        down = (down * (n - 1.0) + loss) / n;
        values.push((first + offset + 1, rmi_value(up, down)));
    }

    values
}

impl Factor for RmiFactor {
    fn name(&self) -> &str {
        NAME
    }

    fn set_data(&mut self, series: MarketSeries) {
        self.series = Some(series);
        self.output = None;
    }

    fn set_params(&mut self, params: &Value) -> Result<()> {
        let parsed = if params.is_null() {
            RmiParams::default()
        } else {
            RmiParams::deserialize(params).context("invalid RMI parameters")?
        };

        if parsed.period == 0 || parsed.momentum == 0 {
            bail!("RMI period and momentum must be at least 1");
        }
        self.params = parsed;
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        let series = self.series.as_ref().context("RMI has no market data")?;

        let closes = series
            .bars
            .iter()
            .map(|bar| {
                bar.close
                    .to_f64()
                    .with_context(|| format!("close {} is not representable", bar.close))
            })
            .collect::<Result<Vec<_>>>()?;

        let points = compute(&closes, self.params.period, self.params.momentum)
            .into_iter()
            .map(|(index, value)| FactorPoint {
                timestamp: series.bars[index].timestamp,
                value,
            })
            .collect();

        self.output = Some(FactorOutput {
            code: series.code.clone(),
            date: series.date,
            points,
        });
        Ok(())
    }

    fn result(&self) -> Result<FactorOutput> {
        self.output.clone().context("RMI has not been run")
    }
}
