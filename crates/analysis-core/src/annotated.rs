use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::series::BarSeries;
use crate::types::Bar;

/// Indicator values attached to one bar.
///
/// `None` means the value is undefined at this bar, either because the window
/// has not filled yet or because the indicator was omitted for the series.
/// Moving averages are keyed by period; an omitted period has no key at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub sma: BTreeMap<usize, Option<f64>>,
    pub ema: BTreeMap<usize, Option<f64>>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub rsi: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub atr: Option<f64>,
    pub stoch_k: Option<f64>,
    pub stoch_d: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub cci: Option<f64>,
    pub mfi: Option<f64>,
    pub obv: Option<f64>,
    /// Cumulative volume-weighted average price since the first bar.
    pub cum_vwap: Option<f64>,
}

impl IndicatorSet {
    pub fn sma(&self, period: usize) -> Option<f64> {
        self.sma.get(&period).copied().flatten()
    }

    pub fn ema(&self, period: usize) -> Option<f64> {
        self.ema.get(&period).copied().flatten()
    }

    /// Look up a value by column name, e.g. `"sma_20"`, `"rsi"`, `"bb_lower"`.
    pub fn get(&self, name: &str) -> Option<f64> {
        if let Some(period) = name.strip_prefix("sma_") {
            return period.parse().ok().and_then(|p| self.sma(p));
        }
        if let Some(period) = name.strip_prefix("ema_") {
            return period.parse().ok().and_then(|p| self.ema(p));
        }
        match name {
            "macd" => self.macd,
            "macd_signal" => self.macd_signal,
            "macd_hist" => self.macd_hist,
            "rsi" => self.rsi,
            "bb_upper" => self.bb_upper,
            "bb_middle" => self.bb_middle,
            "bb_lower" => self.bb_lower,
            "atr" => self.atr,
            "stoch_k" => self.stoch_k,
            "stoch_d" => self.stoch_d,
            "adx" => self.adx,
            "plus_di" => self.plus_di,
            "minus_di" => self.minus_di,
            "cci" => self.cci,
            "mfi" => self.mfi,
            "obv" => self.obv,
            "cum_vwap" => self.cum_vwap,
            _ => None,
        }
    }
}

/// A bar together with its indicator values, as handed to output collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedBar<'a> {
    #[serde(flatten)]
    pub bar: &'a Bar,
    #[serde(flatten)]
    pub indicators: &'a IndicatorSet,
}

/// A bar series extended with one [`IndicatorSet`] per bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAnnotatedSeries")]
pub struct AnnotatedSeries {
    series: BarSeries,
    rows: Vec<IndicatorSet>,
    computed: Vec<String>,
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnnotatedSeries {
    series: BarSeries,
    rows: Vec<IndicatorSet>,
    #[serde(default)]
    computed: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

impl TryFrom<RawAnnotatedSeries> for AnnotatedSeries {
    type Error = AnalysisError;

    fn try_from(raw: RawAnnotatedSeries) -> Result<Self, Self::Error> {
        if raw.rows.len() != raw.series.len() {
            return Err(AnalysisError::RowMismatch {
                rows: raw.rows.len(),
                bars: raw.series.len(),
            });
        }
        Ok(Self {
            series: raw.series,
            rows: raw.rows,
            computed: raw.computed,
            warnings: raw.warnings,
        })
    }
}

impl AnnotatedSeries {
    /// Assemble from parts. `rows` is padded or truncated to the series length.
    pub fn from_parts(
        series: BarSeries,
        mut rows: Vec<IndicatorSet>,
        computed: Vec<String>,
        warnings: Vec<String>,
    ) -> Self {
        rows.resize_with(series.len(), IndicatorSet::default);
        Self {
            series,
            rows,
            computed,
            warnings,
        }
    }

    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn bars(&self) -> &[Bar] {
        self.series.bars()
    }

    pub fn rows(&self) -> &[IndicatorSet] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&IndicatorSet> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Indicator groups actually computed, e.g. `"sma_20"`, `"macd"`, `"bollinger"`.
    pub fn computed(&self) -> &[String] {
        &self.computed
    }

    pub fn is_computed(&self, group: &str) -> bool {
        self.computed.iter().any(|c| c == group)
    }

    /// One entry per indicator omitted for lack of history or bad settings.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn value(&self, index: usize, name: &str) -> Option<f64> {
        self.rows.get(index).and_then(|r| r.get(name))
    }

    pub fn column(&self, name: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.get(name)).collect()
    }

    pub fn annotated_bars(&self) -> Vec<AnnotatedBar<'_>> {
        self.series
            .bars()
            .iter()
            .zip(self.rows.iter())
            .map(|(bar, indicators)| AnnotatedBar { bar, indicators })
            .collect()
    }
}
