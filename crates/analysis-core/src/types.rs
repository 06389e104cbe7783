use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(alias = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(alias = "o")]
    pub open: f64,
    #[serde(alias = "h")]
    pub high: f64,
    #[serde(alias = "l")]
    pub low: f64,
    #[serde(alias = "c")]
    pub close: f64,
    #[serde(alias = "v")]
    pub volume: f64,
    #[serde(default)]
    pub vwap: Option<f64>,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            vwap: None,
        }
    }

    /// Absolute size of the real body.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    pub fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn midpoint(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Direction a pattern or signal implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Bullish,
    Bearish,
    Neutral,
}

impl Polarity {
    /// The tradable direction, if any. Neutral occurrences carry no expectation.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Polarity::Bullish => Some(Direction::Bullish),
            Polarity::Bearish => Some(Direction::Bearish),
            Polarity::Neutral => None,
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Bullish => write!(f, "bullish"),
            Polarity::Bearish => write!(f, "bearish"),
            Polarity::Neutral => write!(f, "neutral"),
        }
    }
}

/// Expected price direction used when validating a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Direction {
    /// Whether a forward return counts as a win in this direction.
    pub fn is_success(&self, return_pct: f64) -> bool {
        match self {
            Direction::Bullish => return_pct > 0.0,
            Direction::Bearish => return_pct < 0.0,
        }
    }
}

impl From<Direction> for Polarity {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Bullish => Polarity::Bullish,
            Direction::Bearish => Polarity::Bearish,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Polarity::from(*self).fmt(f)
    }
}

/// A detected pattern or signal anchored to a bar index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub index: usize,
    pub name: String,
    pub polarity: Polarity,
    pub description: String,
}

impl Occurrence {
    pub fn new(index: usize, name: impl Into<String>, polarity: Polarity, description: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            polarity,
            description: description.into(),
        }
    }
}
