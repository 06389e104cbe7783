use std::collections::BTreeMap;

use analysis_core::stats::{mean, median};
use analysis_core::{AnnotatedSeries, BarSeries, Direction, Occurrence, SignalSource};
use rayon::prelude::*;
use technical_analysis::{detect, PatternKind};
use tracing::{debug, info};

use crate::models::*;
use crate::signals::{IndicatorSignal, SignalRule};
use crate::statistical::{binomial_p_value, bootstrap_mean_ci};

/// Measure what happened `horizon` bars after each occurrence.
///
/// The result is named after the occurrences: their shared name, or every
/// distinct name joined with `+` in first-seen order for a mixed list. An empty
/// list yields an unnamed result; use [`evaluate_signal`] to name it.
pub fn evaluate(series: &BarSeries, occurrences: &[Occurrence], expected: Direction, horizon: usize) -> BacktestResult {
    let mut names: Vec<&str> = Vec::new();
    for occurrence in occurrences {
        if !names.contains(&occurrence.name.as_str()) {
            names.push(occurrence.name.as_str());
        }
    }
    evaluate_signal(series, &names.join("+"), occurrences, expected, horizon)
}

/// [`evaluate`] under an explicit signal name.
///
/// Occurrences without a full forward window, or with a zero entry price, are skipped.
pub fn evaluate_signal(
    series: &BarSeries,
    name: &str,
    occurrences: &[Occurrence],
    expected: Direction,
    horizon: usize,
) -> BacktestResult {
    let name = name.to_string();
    let bars = series.bars();

    let details: Vec<OccurrenceOutcome> = occurrences
        .iter()
        .filter_map(|o| {
            let exit_index = o.index.checked_add(horizon)?;
            let entry = bars.get(o.index)?;
            let exit = bars.get(exit_index)?;
            if entry.close == 0.0 {
                return None;
            }
            let return_pct = (exit.close - entry.close) / entry.close * 100.0;
            Some(OccurrenceOutcome {
                index: o.index,
                timestamp: entry.timestamp,
                entry_price: entry.close,
                exit_price: exit.close,
                return_pct,
                success: expected.is_success(return_pct),
            })
        })
        .collect();

    if details.is_empty() {
        return BacktestResult::empty(name, expected, horizon);
    }

    let returns: Vec<f64> = details.iter().map(|d| d.return_pct).collect();
    let successes = details.iter().filter(|d| d.success).count();
    let counted = details.len();

    BacktestResult {
        signal_name: name,
        expected_polarity: expected,
        horizon,
        occurrences: counted,
        success_rate: successes as f64 / counted as f64 * 100.0,
        avg_return: mean(&returns),
        median_return: median(&returns),
        best_return: returns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        worst_return: returns.iter().copied().fold(f64::INFINITY, f64::min),
        p_value: binomial_p_value(successes, counted),
        confidence_interval: None,
        details,
    }
}

/// Validates every directional pattern and indicator rule across the
/// configured horizons.
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Evaluate one signal source at every configured horizon.
    pub fn run_source(&self, annotated: &AnnotatedSeries, source: &dyn SignalSource) -> Vec<BacktestResult> {
        let occurrences = source.scan(annotated);
        self.evaluate_all(annotated.series(), source.name(), &occurrences, source.expected())
    }

    fn evaluate_all(
        &self,
        series: &BarSeries,
        name: &str,
        occurrences: &[Occurrence],
        expected: Direction,
    ) -> Vec<BacktestResult> {
        self.config
            .horizons
            .iter()
            .map(|&horizon| {
                let mut result = evaluate_signal(series, name, occurrences, expected, horizon);
                if self.config.bootstrap_samples > 0 {
                    let returns: Vec<f64> = result.details.iter().map(|d| d.return_pct).collect();
                    result.confidence_interval =
                        bootstrap_mean_ci(&returns, self.config.bootstrap_samples, self.config.bootstrap_seed);
                }
                debug!(
                    signal = name,
                    horizon,
                    occurrences = result.occurrences,
                    success_rate = result.success_rate,
                    "signal evaluated"
                );
                result
            })
            .collect()
    }

    pub fn run(&self, annotated: &AnnotatedSeries) -> BacktestReport {
        let series = annotated.series();
        let mut results = Vec::new();

        if self.config.include_patterns {
            // One scan, grouped by pattern; neutral patterns carry no direction to test.
            let mut by_pattern: BTreeMap<PatternKind, Vec<Occurrence>> = BTreeMap::new();
            for occurrence in detect(series, None) {
                if let Some(kind) = PatternKind::from_name(&occurrence.name) {
                    by_pattern.entry(kind).or_default().push(occurrence);
                }
            }
            for kind in PatternKind::ALL {
                let Some(expected) = kind.polarity().direction() else {
                    continue;
                };
                let occurrences = by_pattern.remove(&kind).unwrap_or_default();
                results.extend(self.evaluate_all(series, kind.name(), &occurrences, expected));
            }
        }

        for rule in SignalRule::ALL {
            let source = IndicatorSignal { rule, thresholds: self.config.thresholds };
            results.extend(self.run_source(annotated, &source));
        }

        let with_occurrences = results.iter().filter(|r| r.occurrences > 0).count();
        info!(
            symbol = series.symbol(),
            bars = series.len(),
            results = results.len(),
            with_occurrences,
            "backtest complete"
        );

        BacktestReport {
            symbol: series.symbol().to_string(),
            interval: series.interval().to_string(),
            bars: series.len(),
            results,
        }
    }

    /// Run every instrument independently, in parallel. Output order follows input order.
    pub fn run_universe(&self, universe: Vec<AnnotatedSeries>) -> Vec<BacktestReport> {
        info!(instruments = universe.len(), "running universe backtest");
        universe.par_iter().map(|annotated| self.run(annotated)).collect()
    }
}
