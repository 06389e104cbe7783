use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AnalysisError;
use crate::types::Bar;

/// A bar dropped during ingestion, with the position it had in the raw input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedBar {
    pub index: usize,
    pub reason: String,
}

/// Ordered, validated bars for one instrument.
///
/// Deserialization goes through [`BarSeries::new`], so JSON input gets the
/// same bar checks as bars built in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBarSeries")]
pub struct BarSeries {
    symbol: String,
    interval: String,
    source: String,
    bars: Vec<Bar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    rejected: Vec<RejectedBar>,
}

/// Wire shape of a series before validation.
#[derive(Debug, Deserialize)]
struct RawBarSeries {
    symbol: String,
    #[serde(default)]
    interval: String,
    #[serde(default)]
    source: String,
    bars: Vec<Bar>,
    #[serde(default)]
    rejected: Vec<RejectedBar>,
}

impl TryFrom<RawBarSeries> for BarSeries {
    type Error = AnalysisError;

    fn try_from(raw: RawBarSeries) -> Result<Self, Self::Error> {
        let mut series = BarSeries::new(raw.symbol, raw.interval, raw.source, raw.bars)?;
        if !raw.rejected.is_empty() {
            let mut rejected = raw.rejected;
            rejected.append(&mut series.rejected);
            series.rejected = rejected;
        }
        Ok(series)
    }
}

impl BarSeries {
    /// Validate raw bars and build a series.
    ///
    /// Bars breaking an OHLC invariant, carrying non-finite values or negative
    /// volume, or not strictly later than the previous accepted bar are dropped
    /// and logged. Fails only when nothing survives.
    pub fn new(
        symbol: impl Into<String>,
        interval: impl Into<String>,
        source: impl Into<String>,
        raw: Vec<Bar>,
    ) -> Result<Self, AnalysisError> {
        let symbol = symbol.into();
        let mut bars: Vec<Bar> = Vec::with_capacity(raw.len());
        let mut rejected = Vec::new();
        let mut last_ts: Option<DateTime<Utc>> = None;

        for (index, bar) in raw.into_iter().enumerate() {
            let check = validate_bar(index, &bar).and_then(|_| match last_ts {
                Some(prev) if bar.timestamp <= prev => Err(AnalysisError::InvalidBar {
                    index,
                    reason: format!("timestamp {} not after {}", bar.timestamp, prev),
                }),
                _ => Ok(()),
            });

            match check {
                Ok(()) => {
                    last_ts = Some(bar.timestamp);
                    bars.push(bar);
                }
                Err(AnalysisError::InvalidBar { index, reason }) => {
                    warn!(symbol = %symbol, index, %reason, "rejecting bar");
                    rejected.push(RejectedBar { index, reason });
                }
                Err(other) => return Err(other),
            }
        }

        if bars.is_empty() {
            warn!(symbol = %symbol, rejected = rejected.len(), "no valid bars in series");
            return Err(AnalysisError::EmptySeries);
        }

        Ok(Self {
            symbol,
            interval: interval.into(),
            source: source.into(),
            bars,
            rejected,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn rejected(&self) -> &[RejectedBar] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    /// Sub-series over `range`, sharing the labels. Returns `None` for an
    /// empty or out-of-bounds range.
    pub fn window(&self, range: Range<usize>) -> Option<BarSeries> {
        if range.start >= range.end || range.end > self.bars.len() {
            return None;
        }
        Some(Self {
            symbol: self.symbol.clone(),
            interval: self.interval.clone(),
            source: self.source.clone(),
            bars: self.bars[range].to_vec(),
            rejected: Vec::new(),
        })
    }
}

fn validate_bar(index: usize, bar: &Bar) -> Result<(), AnalysisError> {
    let invalid = |reason: String| Err(AnalysisError::InvalidBar { index, reason });

    let fields = [bar.open, bar.high, bar.low, bar.close, bar.volume];
    if fields.iter().any(|v| !v.is_finite()) {
        return invalid("non-finite OHLCV value".to_string());
    }
    if bar.volume < 0.0 {
        return invalid(format!("negative volume {}", bar.volume));
    }
    if bar.high < bar.low
        || bar.high < bar.open
        || bar.high < bar.close
        || bar.low > bar.open
        || bar.low > bar.close
    {
        return invalid(format!(
            "OHLC inconsistent: O={:.2} H={:.2} L={:.2} C={:.2}",
            bar.open, bar.high, bar.low, bar.close
        ));
    }
    Ok(())
}
