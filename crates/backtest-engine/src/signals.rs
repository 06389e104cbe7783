use analysis_core::{AnnotatedSeries, Direction, IndicatorSet, Occurrence, SignalSource, SignalThresholds};
use serde::{Deserialize, Serialize};
use technical_analysis::{detect, PatternKind};

/// Indicator-threshold and crossover events over an annotated series.
///
/// Level rules fire on every bar beyond the threshold; cross rules fire on
/// the bar where the ordering flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRule {
    RsiOversold,
    RsiOverbought,
    MacdBullishCross,
    MacdBearishCross,
    GoldenCross,
    DeathCross,
    BollingerLowerTouch,
    BollingerUpperTouch,
    StochasticOversold,
    StochasticOverbought,
}

impl SignalRule {
    pub const ALL: [SignalRule; 10] = [
        SignalRule::RsiOversold,
        SignalRule::RsiOverbought,
        SignalRule::MacdBullishCross,
        SignalRule::MacdBearishCross,
        SignalRule::GoldenCross,
        SignalRule::DeathCross,
        SignalRule::BollingerLowerTouch,
        SignalRule::BollingerUpperTouch,
        SignalRule::StochasticOversold,
        SignalRule::StochasticOverbought,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SignalRule::RsiOversold => "rsi_oversold",
            SignalRule::RsiOverbought => "rsi_overbought",
            SignalRule::MacdBullishCross => "macd_bullish_cross",
            SignalRule::MacdBearishCross => "macd_bearish_cross",
            SignalRule::GoldenCross => "golden_cross",
            SignalRule::DeathCross => "death_cross",
            SignalRule::BollingerLowerTouch => "bollinger_lower_touch",
            SignalRule::BollingerUpperTouch => "bollinger_upper_touch",
            SignalRule::StochasticOversold => "stochastic_oversold",
            SignalRule::StochasticOverbought => "stochastic_overbought",
        }
    }

    pub fn expected(&self) -> Direction {
        match self {
            SignalRule::RsiOversold
            | SignalRule::MacdBullishCross
            | SignalRule::GoldenCross
            | SignalRule::BollingerLowerTouch
            | SignalRule::StochasticOversold => Direction::Bullish,
            SignalRule::RsiOverbought
            | SignalRule::MacdBearishCross
            | SignalRule::DeathCross
            | SignalRule::BollingerUpperTouch
            | SignalRule::StochasticOverbought => Direction::Bearish,
        }
    }

    fn description(&self, t: &SignalThresholds) -> String {
        match self {
            SignalRule::RsiOversold => format!("RSI below {}", t.rsi_oversold),
            SignalRule::RsiOverbought => format!("RSI above {}", t.rsi_overbought),
            SignalRule::MacdBullishCross => "MACD crossed above its signal line".to_string(),
            SignalRule::MacdBearishCross => "MACD crossed below its signal line".to_string(),
            SignalRule::GoldenCross => "SMA20 crossed above SMA50".to_string(),
            SignalRule::DeathCross => "SMA20 crossed below SMA50".to_string(),
            SignalRule::BollingerLowerTouch => "Close at or below the lower Bollinger band".to_string(),
            SignalRule::BollingerUpperTouch => "Close at or above the upper Bollinger band".to_string(),
            SignalRule::StochasticOversold => format!("%K and %D below {}", t.stoch_oversold),
            SignalRule::StochasticOverbought => format!("%K and %D above {}", t.stoch_overbought),
        }
    }

    /// Whether the rule fires at bar `i`. Undefined inputs never fire.
    pub fn fires_at(&self, annotated: &AnnotatedSeries, i: usize, t: &SignalThresholds) -> bool {
        let Some(row) = annotated.row(i) else {
            return false;
        };
        let prev = i.checked_sub(1).and_then(|p| annotated.row(p));
        let close = annotated.bars()[i].close;

        match self {
            SignalRule::RsiOversold => row.rsi.is_some_and(|r| r < t.rsi_oversold),
            SignalRule::RsiOverbought => row.rsi.is_some_and(|r| r > t.rsi_overbought),
            SignalRule::MacdBullishCross => crossed_above(prev, row, |r| r.macd, |r| r.macd_signal),
            SignalRule::MacdBearishCross => crossed_above(prev, row, |r| r.macd_signal, |r| r.macd),
            SignalRule::GoldenCross => crossed_above(prev, row, |r| r.sma(20), |r| r.sma(50)),
            SignalRule::DeathCross => crossed_above(prev, row, |r| r.sma(50), |r| r.sma(20)),
            SignalRule::BollingerLowerTouch => row.bb_lower.is_some_and(|b| close <= b),
            SignalRule::BollingerUpperTouch => row.bb_upper.is_some_and(|b| close >= b),
            SignalRule::StochasticOversold => matches!(
                (row.stoch_k, row.stoch_d),
                (Some(k), Some(d)) if k < t.stoch_oversold && d < t.stoch_oversold
            ),
            SignalRule::StochasticOverbought => matches!(
                (row.stoch_k, row.stoch_d),
                (Some(k), Some(d)) if k > t.stoch_overbought && d > t.stoch_overbought
            ),
        }
    }

    pub fn scan_with(&self, annotated: &AnnotatedSeries, thresholds: &SignalThresholds) -> Vec<Occurrence> {
        (0..annotated.len())
            .filter(|&i| self.fires_at(annotated, i, thresholds))
            .map(|i| Occurrence::new(i, self.name(), self.expected().into(), self.description(thresholds)))
            .collect()
    }
}

/// `a` moved from at-or-below `b` on the previous bar to above it on this one.
fn crossed_above(
    prev: Option<&IndicatorSet>,
    curr: &IndicatorSet,
    a: impl Fn(&IndicatorSet) -> Option<f64>,
    b: impl Fn(&IndicatorSet) -> Option<f64>,
) -> bool {
    let Some(prev) = prev else {
        return false;
    };
    match (a(prev), b(prev), a(curr), b(curr)) {
        (Some(pa), Some(pb), Some(ca), Some(cb)) => pa <= pb && ca > cb,
        _ => false,
    }
}

impl SignalSource for SignalRule {
    fn name(&self) -> &str {
        SignalRule::name(self)
    }

    fn expected(&self) -> Direction {
        SignalRule::expected(self)
    }

    fn scan(&self, series: &AnnotatedSeries) -> Vec<Occurrence> {
        self.scan_with(series, &SignalThresholds::default())
    }
}

/// A rule bound to specific thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSignal {
    pub rule: SignalRule,
    pub thresholds: SignalThresholds,
}

impl SignalSource for IndicatorSignal {
    fn name(&self) -> &str {
        self.rule.name()
    }

    fn expected(&self) -> Direction {
        self.rule.expected()
    }

    fn scan(&self, series: &AnnotatedSeries) -> Vec<Occurrence> {
        self.rule.scan_with(series, &self.thresholds)
    }
}

/// Occurrences of one candlestick pattern, validated in the given direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternSource {
    pub pattern: PatternKind,
    pub expected: Direction,
}

impl PatternSource {
    /// Directional patterns only; neutral ones have nothing to validate.
    pub fn new(pattern: PatternKind) -> Option<Self> {
        pattern.polarity().direction().map(|expected| Self { pattern, expected })
    }

    pub fn with_direction(pattern: PatternKind, expected: Direction) -> Self {
        Self { pattern, expected }
    }
}

impl SignalSource for PatternSource {
    fn name(&self) -> &str {
        self.pattern.name()
    }

    fn expected(&self) -> Direction {
        self.expected
    }

    fn scan(&self, series: &AnnotatedSeries) -> Vec<Occurrence> {
        detect(series.series(), None)
            .into_iter()
            .filter(|o| o.name == self.pattern.name())
            .collect()
    }
}
