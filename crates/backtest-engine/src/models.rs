use analysis_core::{AnalysisConfig, Direction, SignalThresholds};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Configuration for a validation run over one or more instruments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Forward horizons, in bars.
    pub horizons: Vec<usize>,
    #[serde(default)]
    pub thresholds: SignalThresholds,
    /// Evaluate candlestick patterns alongside indicator rules.
    #[serde(default = "default_true")]
    pub include_patterns: bool,
    /// Bootstrap resamples for the average-return interval. 0 disables it.
    #[serde(default)]
    pub bootstrap_samples: usize,
    #[serde(default = "default_seed")]
    pub bootstrap_seed: u64,
}

fn default_true() -> bool {
    true
}

fn default_seed() -> u64 {
    42
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            horizons: vec![5, 10, 20],
            thresholds: SignalThresholds::default(),
            include_patterns: true,
            bootstrap_samples: 0,
            bootstrap_seed: default_seed(),
        }
    }
}

impl From<&AnalysisConfig> for BacktestConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            horizons: config.horizons.clone(),
            thresholds: config.thresholds,
            ..Self::default()
        }
    }
}

/// Forward outcome of a single occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceOutcome {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub return_pct: f64,
    pub success: bool,
}

/// 95% bootstrap interval for the mean forward return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub samples: usize,
}

/// How often one signal preceded a move in its expected direction at one horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub signal_name: String,
    pub expected_polarity: Direction,
    pub horizon: usize,
    /// Occurrences with a full forward window.
    pub occurrences: usize,
    pub success_rate: f64, // 0-100 percentage
    pub avg_return: f64,
    pub median_return: f64,
    pub best_return: f64,
    pub worst_return: f64,
    /// Two-sided binomial test of the success count against a coin flip.
    pub p_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_interval: Option<ConfidenceInterval>,
    pub details: Vec<OccurrenceOutcome>,
}

impl BacktestResult {
    pub fn empty(signal_name: impl Into<String>, expected_polarity: Direction, horizon: usize) -> Self {
        Self {
            signal_name: signal_name.into(),
            expected_polarity,
            horizon,
            occurrences: 0,
            success_rate: 0.0,
            avg_return: 0.0,
            median_return: 0.0,
            best_return: 0.0,
            worst_return: 0.0,
            p_value: 1.0,
            confidence_interval: None,
            details: Vec::new(),
        }
    }

    pub fn successes(&self) -> usize {
        self.details.iter().filter(|d| d.success).count()
    }

    pub fn is_significant(&self, alpha: f64) -> bool {
        self.occurrences > 0 && self.p_value < alpha
    }
}

/// All results for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub interval: String,
    pub bars: usize,
    pub results: Vec<BacktestResult>,
}

impl BacktestReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn result(&self, signal_name: &str, horizon: usize) -> Option<&BacktestResult> {
        self.results
            .iter()
            .find(|r| r.signal_name == signal_name && r.horizon == horizon)
    }

    /// Results with at least `min_occurrences`, highest success rate first.
    pub fn ranked(&self, min_occurrences: usize) -> Vec<&BacktestResult> {
        let mut ranked: Vec<&BacktestResult> = self
            .results
            .iter()
            .filter(|r| r.occurrences >= min_occurrences.max(1))
            .collect();
        ranked.sort_by(|a, b| {
            b.success_rate
                .total_cmp(&a.success_rate)
                .then_with(|| b.occurrences.cmp(&a.occurrences))
                .then_with(|| a.signal_name.cmp(&b.signal_name))
        });
        ranked
    }
}
