use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdSettings {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdSettings {
    fn default() -> Self {
        Self { fast: 12, slow: 26, signal: 9 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerSettings {
    pub period: usize,
    pub std_dev: f64,
}

impl Default for BollingerSettings {
    fn default() -> Self {
        Self { period: 20, std_dev: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticSettings {
    pub k_period: usize,
    pub k_slowing: usize,
    pub d_period: usize,
}

impl Default for StochasticSettings {
    fn default() -> Self {
        Self { k_period: 14, k_slowing: 3, d_period: 3 }
    }
}

/// Window lengths for every indicator the engine computes.
///
/// Any field missing from a JSON document falls back to its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub sma: Vec<usize>,
    pub ema: Vec<usize>,
    pub macd: MacdSettings,
    pub rsi: usize,
    pub bollinger: BollingerSettings,
    pub atr: usize,
    pub stochastic: StochasticSettings,
    pub adx: usize,
    pub cci: usize,
    pub mfi: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            sma: vec![20, 50, 200],
            ema: vec![12, 26],
            macd: MacdSettings::default(),
            rsi: 14,
            bollinger: BollingerSettings::default(),
            atr: 14,
            stochastic: StochasticSettings::default(),
            adx: 14,
            cci: 20,
            mfi: 14,
        }
    }
}

impl IndicatorSettings {
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(json).map_err(|e| AnalysisError::InvalidConfig(format!("indicator settings: {e}")))
    }

    /// Shorter windows for intraday noise, longer ones for daily and up.
    ///
    /// Every preset keeps SMA 20, 50 and 200: the golden/death cross rules and
    /// the trend tally read those periods.
    pub fn for_interval(interval: Interval) -> Self {
        match interval.class() {
            IntervalClass::Short => Self {
                sma: vec![9, 20, 50, 200],
                ema: vec![9, 21],
                macd: MacdSettings { fast: 8, slow: 17, signal: 9 },
                rsi: 9,
                bollinger: BollingerSettings::default(),
                atr: 10,
                stochastic: StochasticSettings { k_period: 5, k_slowing: 3, d_period: 3 },
                adx: 10,
                cci: 14,
                mfi: 10,
            },
            IntervalClass::Medium => Self::default(),
            IntervalClass::Long => Self {
                sma: vec![20, 50, 100, 200],
                ema: vec![26, 50],
                macd: MacdSettings::default(),
                rsi: 21,
                bollinger: BollingerSettings::default(),
                atr: 21,
                stochastic: StochasticSettings { k_period: 21, k_slowing: 5, d_period: 5 },
                adx: 14,
                cci: 20,
                mfi: 14,
            },
        }
    }
}

/// Levels at which indicator threshold rules fire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalThresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub stoch_oversold: f64,
    pub stoch_overbought: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            stoch_oversold: 20.0,
            stoch_overbought: 80.0,
        }
    }
}

/// Timeframe-adjusted indicator presets for a bar interval.
pub fn settings_for_interval(interval: Interval) -> IndicatorSettings {
    IndicatorSettings::for_interval(interval)
}

/// Bar sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Seconds(u32),
    Minutes(u32),
    Hours(u32),
    Days(u32),
    Weeks(u32),
    Months(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalClass {
    /// Five minutes or less, including sub-minute bars.
    Short,
    /// Above five minutes and below a day.
    Medium,
    /// Daily and longer.
    Long,
}

impl Interval {
    pub fn to_seconds(&self) -> u64 {
        match *self {
            Interval::Seconds(n) => n as u64,
            Interval::Minutes(n) => n as u64 * 60,
            Interval::Hours(n) => n as u64 * 3_600,
            Interval::Days(n) => n as u64 * 86_400,
            Interval::Weeks(n) => n as u64 * 604_800,
            Interval::Months(n) => n as u64 * 2_592_000,
        }
    }

    pub fn class(&self) -> IntervalClass {
        match self.to_seconds() {
            s if s <= 300 => IntervalClass::Short,
            s if s < 86_400 => IntervalClass::Medium,
            _ => IntervalClass::Long,
        }
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::Minutes(5)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Seconds(n) => write!(f, "{n}s"),
            Interval::Minutes(n) => write!(f, "{n}m"),
            Interval::Hours(n) => write!(f, "{n}h"),
            Interval::Days(n) => write!(f, "{n}d"),
            Interval::Weeks(n) => write!(f, "{n}wk"),
            Interval::Months(n) => write!(f, "{n}mo"),
        }
    }
}

impl FromStr for Interval {
    type Err = AnalysisError;

    /// Accepts provider labels such as `30s`, `1m`, `5Min`, `5-minute`, `1H`,
    /// `1d`, `daily`, `1wk` and `1mo`.
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let cleaned: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect();

        match cleaned.as_str() {
            "daily" => return Ok(Interval::Days(1)),
            "hourly" => return Ok(Interval::Hours(1)),
            "weekly" => return Ok(Interval::Weeks(1)),
            "monthly" => return Ok(Interval::Months(1)),
            _ => {}
        }

        let split = cleaned.find(|c: char| !c.is_ascii_digit()).unwrap_or(cleaned.len());
        let (digits, unit) = cleaned.split_at(split);
        let count: u32 = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| AnalysisError::InvalidConfig(format!("interval count in '{label}'")))?
        };
        if count == 0 {
            return Err(AnalysisError::InvalidConfig(format!("zero-length interval '{label}'")));
        }

        match unit {
            "s" | "sec" | "second" | "seconds" => Ok(Interval::Seconds(count)),
            "m" | "min" | "mins" | "minute" | "minutes" | "t" => Ok(Interval::Minutes(count)),
            "h" | "hr" | "hour" | "hours" => Ok(Interval::Hours(count)),
            "d" | "day" | "days" => Ok(Interval::Days(count)),
            "w" | "wk" | "week" | "weeks" => Ok(Interval::Weeks(count)),
            "mo" | "mon" | "month" | "months" => Ok(Interval::Months(count)),
            _ => Err(AnalysisError::InvalidConfig(format!("unknown interval '{label}'"))),
        }
    }
}

/// Run-level configuration: indicator windows, forward horizons and
/// support/resistance clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub interval: Interval,
    pub indicators: IndicatorSettings,
    pub horizons: Vec<usize>,
    pub sr_lookback: usize,
    pub min_zone_touches: usize,
    #[serde(default)]
    pub thresholds: SignalThresholds,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let interval = Interval::default();
        Self {
            interval,
            indicators: IndicatorSettings::for_interval(interval),
            horizons: vec![5, 10, 20],
            sr_lookback: 20,
            min_zone_touches: 2,
            thresholds: SignalThresholds::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load `.env` (if present) and read the configuration from the environment.
    pub fn load() -> Result<Self, AnalysisError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Read the configuration from environment variables:
    /// `ANALYSIS_INTERVAL`, `BACKTEST_HORIZONS`, `SR_LOOKBACK`,
    /// `SR_MIN_TOUCHES`, `INDICATOR_SETTINGS` and `SIGNAL_THRESHOLDS` (both JSON).
    pub fn from_env() -> Result<Self, AnalysisError> {
        let interval: Interval = env::var("ANALYSIS_INTERVAL")
            .unwrap_or_else(|_| "5m".to_string())
            .parse()?;

        let indicators = match env::var("INDICATOR_SETTINGS") {
            Ok(json) if !json.trim().is_empty() => IndicatorSettings::from_json(&json)?,
            _ => IndicatorSettings::for_interval(interval),
        };

        let horizons = parse_horizons(&env::var("BACKTEST_HORIZONS").unwrap_or_else(|_| "5,10,20".to_string()))?;

        let sr_lookback = parse_usize("SR_LOOKBACK", &env::var("SR_LOOKBACK").unwrap_or_else(|_| "20".to_string()))?;
        let min_zone_touches =
            parse_usize("SR_MIN_TOUCHES", &env::var("SR_MIN_TOUCHES").unwrap_or_else(|_| "2".to_string()))?;

        let thresholds = match env::var("SIGNAL_THRESHOLDS") {
            Ok(json) if !json.trim().is_empty() => serde_json::from_str(&json)
                .map_err(|e| AnalysisError::InvalidConfig(format!("signal thresholds: {e}")))?,
            _ => SignalThresholds::default(),
        };

        let config = Self {
            interval,
            indicators,
            horizons,
            sr_lookback,
            min_zone_touches,
            thresholds,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.horizons.is_empty() {
            return Err(AnalysisError::InvalidConfig("at least one horizon is required".to_string()));
        }
        if self.horizons.contains(&0) {
            return Err(AnalysisError::InvalidConfig("horizons must be positive".to_string()));
        }
        if self.sr_lookback < 3 {
            return Err(AnalysisError::InvalidConfig("SR_LOOKBACK must be at least 3".to_string()));
        }
        if self.min_zone_touches == 0 {
            return Err(AnalysisError::InvalidConfig("SR_MIN_TOUCHES must be positive".to_string()));
        }
        let t = &self.thresholds;
        if t.rsi_oversold >= t.rsi_overbought || t.stoch_oversold >= t.stoch_overbought {
            return Err(AnalysisError::InvalidConfig(
                "oversold thresholds must sit below overbought thresholds".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_usize(name: &str, raw: &str) -> Result<usize, AnalysisError> {
    raw.trim()
        .parse()
        .map_err(|_| AnalysisError::InvalidConfig(format!("{name}: expected an integer, got '{raw}'")))
}

/// Parse a comma separated horizon list such as `"5,10,20"`.
pub fn parse_horizons(raw: &str) -> Result<Vec<usize>, AnalysisError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_usize("BACKTEST_HORIZONS", s))
        .collect()
}
