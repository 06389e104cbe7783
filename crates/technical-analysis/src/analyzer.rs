use analysis_core::{AnalysisConfig, AnnotatedSeries, BarSeries, IndicatorSet, Occurrence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::compute;
use crate::patterns::detect;
use crate::structure::*;

/// Bars at the end of the series scanned for patterns in a report.
pub const RECENT_PATTERN_BARS: usize = 5;

/// Snapshot of an instrument's technical state at its last bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalReport {
    pub symbol: String,
    pub interval: String,
    pub timestamp: DateTime<Utc>,
    pub last_close: f64,
    pub indicators: IndicatorSet,
    pub patterns: Vec<Occurrence>,
    pub trends: Vec<TrendAnalysis>,
    pub levels: SupportResistance,
    pub breakouts: Breakouts,
    pub pivots: Option<PivotLevels>,
    pub warnings: Vec<String>,
}

impl TechnicalReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub struct TechnicalAnalysisEngine {
    config: AnalysisConfig,
}

impl Default for TechnicalAnalysisEngine {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl TechnicalAnalysisEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the indicator engine with the configured settings.
    pub fn annotate(&self, series: &BarSeries) -> AnnotatedSeries {
        compute(series, &self.config.indicators)
    }

    pub fn analyze(&self, series: &BarSeries) -> TechnicalReport {
        self.report(&self.annotate(series))
    }

    /// Build a report from an already annotated series.
    pub fn report(&self, annotated: &AnnotatedSeries) -> TechnicalReport {
        let series = annotated.series();
        let last = series.bars().last();

        let trends: Vec<TrendAnalysis> = [TrendHorizon::Short, TrendHorizon::Medium, TrendHorizon::Long]
            .into_iter()
            .map(|h| analyze_trend_with(annotated, h, &self.config.thresholds))
            .collect();
        let levels = support_resistance(series, self.config.sr_lookback, self.config.min_zone_touches);
        let breakouts = breakouts_at_last_bar(series, self.config.sr_lookback, self.config.min_zone_touches);
        let patterns = detect(series, Some(RECENT_PATTERN_BARS));

        info!(
            symbol = series.symbol(),
            bars = series.len(),
            patterns = patterns.len(),
            warnings = annotated.warnings().len(),
            "technical report built"
        );

        TechnicalReport {
            symbol: series.symbol().to_string(),
            interval: series.interval().to_string(),
            timestamp: last.map(|b| b.timestamp).unwrap_or_default(),
            last_close: last.map(|b| b.close).unwrap_or_default(),
            indicators: annotated.rows().last().cloned().unwrap_or_default(),
            patterns,
            trends,
            levels,
            breakouts,
            pivots: pivot_points(series),
            warnings: annotated.warnings().to_vec(),
        }
    }
}
