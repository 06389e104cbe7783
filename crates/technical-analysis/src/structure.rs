use analysis_core::stats::round_to;
use analysis_core::{AnnotatedSeries, BarSeries, Polarity, SignalThresholds};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Extrema within this fraction of a cluster's running mean join the cluster.
pub const ZONE_TOLERANCE: f64 = 0.005;

/// Zones reported per side.
pub const ZONES_PER_SIDE: usize = 3;

/// A break further than this percentage beyond the level is "Strong".
pub const STRONG_BREAK_PCT: f64 = 1.0;

const ADX_TRENDING: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendHorizon {
    Short,
    Medium,
    Long,
}

impl TrendHorizon {
    /// Bar-to-bar changes considered for momentum and percent change.
    pub fn window(&self) -> usize {
        match self {
            TrendHorizon::Short => 5,
            TrendHorizon::Medium => 10,
            TrendHorizon::Long => 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Momentum {
    #[serde(rename = "Strongly Bullish")]
    StronglyBullish,
    Bullish,
    Neutral,
    Bearish,
    #[serde(rename = "Strongly Bearish")]
    StronglyBearish,
}

/// One vote in the trend tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub name: String,
    pub polarity: Polarity,
}

impl TrendSignal {
    fn new(name: &str, polarity: Polarity) -> Self {
        Self { name: name.to_string(), polarity }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub horizon: TrendHorizon,
    pub direction: TrendDirection,
    /// 0-100
    pub strength: f64,
    pub momentum: Momentum,
    pub signals: Vec<TrendSignal>,
    pub percent_change: f64,
    pub adx: Option<f64>,
}

fn vote_against(name: &str, price: f64, reference: Option<f64>) -> Option<TrendSignal> {
    let level = reference?;
    if price > level {
        Some(TrendSignal::new(&format!("Price above {name}"), Polarity::Bullish))
    } else if price < level {
        Some(TrendSignal::new(&format!("Price below {name}"), Polarity::Bearish))
    } else {
        None
    }
}

fn rsi_vote(rsi: f64, thresholds: &SignalThresholds) -> TrendSignal {
    if rsi < thresholds.rsi_oversold {
        TrendSignal::new("RSI oversold", Polarity::Bullish)
    } else if rsi < 50.0 {
        TrendSignal::new("RSI below 50", Polarity::Bearish)
    } else if rsi <= thresholds.rsi_overbought {
        TrendSignal::new("RSI above 50", Polarity::Bullish)
    } else {
        TrendSignal::new("RSI overbought", Polarity::Bearish)
    }
}

/// Classify the share of up and down closes over the trailing `window` changes.
pub fn momentum(closes: &[f64], window: usize) -> Momentum {
    if closes.len() < 2 || window == 0 {
        return Momentum::Neutral;
    }
    let start = closes.len().saturating_sub(window + 1);
    let recent = &closes[start..];
    let changes = recent.len() - 1;

    let up = recent.windows(2).filter(|w| w[1] > w[0]).count();
    let down = recent.windows(2).filter(|w| w[1] < w[0]).count();
    let up_share = up as f64 / changes as f64;
    let down_share = down as f64 / changes as f64;

    if up_share >= 0.7 {
        Momentum::StronglyBullish
    } else if down_share >= 0.7 {
        Momentum::StronglyBearish
    } else if up_share >= 0.5 && up > down {
        Momentum::Bullish
    } else if down_share >= 0.5 && down > up {
        Momentum::Bearish
    } else {
        Momentum::Neutral
    }
}

/// Direction, strength and momentum at the last bar of an annotated series.
pub fn analyze_trend(annotated: &AnnotatedSeries, horizon: TrendHorizon) -> TrendAnalysis {
    analyze_trend_with(annotated, horizon, &SignalThresholds::default())
}

/// [`analyze_trend`] with the RSI zones taken from `thresholds`.
pub fn analyze_trend_with(
    annotated: &AnnotatedSeries,
    horizon: TrendHorizon,
    thresholds: &SignalThresholds,
) -> TrendAnalysis {
    let closes = annotated.series().closes();
    let window = horizon.window();

    let percent_change = match closes.last() {
        Some(&last) => {
            let base = closes[closes.len().saturating_sub(window + 1)];
            if base != 0.0 {
                (last - base) / base * 100.0
            } else {
                0.0
            }
        }
        None => 0.0,
    };

    let mut signals = Vec::new();
    let mut adx = None;

    if let (Some(&price), Some(row)) = (closes.last(), annotated.rows().last()) {
        signals.extend(vote_against("SMA20", price, row.sma(20)));
        signals.extend(vote_against("SMA50", price, row.sma(50)));
        if horizon == TrendHorizon::Long {
            signals.extend(vote_against("SMA200", price, row.sma(200)));
        }

        if let (Some(macd), Some(signal)) = (row.macd, row.macd_signal) {
            if macd > signal {
                signals.push(TrendSignal::new("MACD above signal", Polarity::Bullish));
            } else if macd < signal {
                signals.push(TrendSignal::new("MACD below signal", Polarity::Bearish));
            }
        }

        if let Some(rsi) = row.rsi {
            signals.push(rsi_vote(rsi, thresholds));
        }

        adx = row.adx;
        if let (Some(adx), Some(plus), Some(minus)) = (row.adx, row.plus_di, row.minus_di) {
            if adx >= ADX_TRENDING {
                if plus > minus {
                    signals.push(TrendSignal::new("Strong trend, +DI leading", Polarity::Bullish));
                } else if minus > plus {
                    signals.push(TrendSignal::new("Strong trend, -DI leading", Polarity::Bearish));
                }
            }
        }
    }

    let bullish = signals.iter().filter(|s| s.polarity == Polarity::Bullish).count();
    let bearish = signals.iter().filter(|s| s.polarity == Polarity::Bearish).count();
    let direction = if bullish > bearish {
        TrendDirection::Uptrend
    } else if bearish > bullish {
        TrendDirection::Downtrend
    } else {
        TrendDirection::Sideways
    };

    let strength = match adx {
        Some(adx) => (2.0 * adx).min(100.0),
        None => (10.0 * percent_change.abs()).min(100.0),
    };

    TrendAnalysis {
        horizon,
        direction,
        strength: round_to(strength, 2),
        momentum: momentum(&closes, window),
        signals,
        percent_change: round_to(percent_change, 2),
        adx,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneSide {
    Support,
    Resistance,
}

/// A price level built from clustered swing highs and lows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub price: f64,
    pub side: ZoneSide,
    pub touches: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupportResistance {
    /// Nearest first.
    pub support: Vec<Zone>,
    /// Nearest first.
    pub resistance: Vec<Zone>,
}

impl SupportResistance {
    pub fn nearest_support(&self) -> Option<&Zone> {
        self.support.first()
    }

    pub fn nearest_resistance(&self) -> Option<&Zone> {
        self.resistance.first()
    }
}

/// Group sorted prices; each value joins the open cluster when it sits within
/// [`ZONE_TOLERANCE`] of that cluster's mean.
fn cluster(sorted: &[f64]) -> Vec<(f64, usize)> {
    let mut clusters: Vec<(f64, usize)> = Vec::new();
    for &price in sorted {
        if let Some((sum, count)) = clusters.last_mut() {
            let mean = *sum / *count as f64;
            if (price - mean).abs() <= ZONE_TOLERANCE * mean.abs() {
                *sum += price;
                *count += 1;
                continue;
            }
        }
        clusters.push((price, 1));
    }
    clusters.into_iter().map(|(sum, count)| (sum / count as f64, count)).collect()
}

/// Support and resistance zones from swing points in the last `lookback` bars.
pub fn support_resistance(series: &BarSeries, lookback: usize, min_touches: usize) -> SupportResistance {
    let bars = series.bars();
    let Some(current) = series.last_close() else {
        return SupportResistance::default();
    };
    let recent = &bars[bars.len().saturating_sub(lookback)..];
    if recent.len() < 3 {
        return SupportResistance::default();
    }

    let mut extrema: Vec<f64> = Vec::new();
    for i in 1..recent.len() - 1 {
        if recent[i].high > recent[i - 1].high && recent[i].high > recent[i + 1].high {
            extrema.push(recent[i].high);
        }
        if recent[i].low < recent[i - 1].low && recent[i].low < recent[i + 1].low {
            extrema.push(recent[i].low);
        }
    }
    extrema.sort_by(|a, b| a.total_cmp(b));

    let zones: Vec<(f64, usize)> = cluster(&extrema)
        .into_iter()
        .filter(|&(_, touches)| touches >= min_touches.max(1))
        .collect();

    let mut support: Vec<Zone> = zones
        .iter()
        .filter(|(price, _)| *price < current)
        .map(|&(price, touches)| Zone { price: round_to(price, 2), side: ZoneSide::Support, touches })
        .collect();
    support.sort_by(|a, b| b.price.total_cmp(&a.price));
    support.truncate(ZONES_PER_SIDE);

    let mut resistance: Vec<Zone> = zones
        .iter()
        .filter(|(price, _)| *price > current)
        .map(|&(price, touches)| Zone { price: round_to(price, 2), side: ZoneSide::Resistance, touches })
        .collect();
    resistance.sort_by(|a, b| a.price.total_cmp(&b.price));
    resistance.truncate(ZONES_PER_SIDE);

    debug!(
        symbol = series.symbol(),
        extrema = extrema.len(),
        support = support.len(),
        resistance = resistance.len(),
        "support/resistance zones"
    );

    SupportResistance { support, resistance }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakoutSeverity {
    Strong,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakout {
    pub level: f64,
    pub close: f64,
    /// Distance beyond the level, in percent of the level.
    pub distance_pct: f64,
    pub severity: BreakoutSeverity,
}

impl Breakout {
    fn new(level: f64, close: f64) -> Self {
        let distance_pct = if level != 0.0 { (close - level).abs() / level.abs() * 100.0 } else { 0.0 };
        let severity = if distance_pct > STRONG_BREAK_PCT {
            BreakoutSeverity::Strong
        } else {
            BreakoutSeverity::Moderate
        };
        Self {
            level,
            close,
            distance_pct: round_to(distance_pct, 2),
            severity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakouts {
    pub resistance_break: Option<Breakout>,
    pub support_break: Option<Breakout>,
}

/// Test the last close against the nearest level on each side.
pub fn detect_breakouts(series: &BarSeries, levels: &SupportResistance) -> Breakouts {
    let Some(close) = series.last_close() else {
        return Breakouts::default();
    };

    let resistance_break = levels
        .nearest_resistance()
        .filter(|zone| close > zone.price)
        .map(|zone| Breakout::new(zone.price, close));
    let support_break = levels
        .nearest_support()
        .filter(|zone| close < zone.price)
        .map(|zone| Breakout::new(zone.price, close));

    Breakouts { resistance_break, support_break }
}

/// Levels from every bar but the last, tested against the last close.
pub fn breakouts_at_last_bar(series: &BarSeries, lookback: usize, min_touches: usize) -> Breakouts {
    match series.window(0..series.len().saturating_sub(1)) {
        Some(history) => {
            let levels = support_resistance(&history, lookback, min_touches);
            detect_breakouts(series, &levels)
        }
        None => Breakouts::default(),
    }
}

/// Classic floor-trader pivots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotLevels {
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub s1: f64,
    pub s2: f64,
}

/// Pivots from the previous bar's high, low and close. `None` with fewer than two bars.
pub fn pivot_points(series: &BarSeries) -> Option<PivotLevels> {
    let bars = series.bars();
    let prev = bars.len().checked_sub(2).map(|i| &bars[i])?;

    let pivot = (prev.high + prev.low + prev.close) / 3.0;
    let range = prev.high - prev.low;
    Some(PivotLevels {
        pivot: round_to(pivot, 2),
        r1: round_to(2.0 * pivot - prev.low, 2),
        r2: round_to(pivot + range, 2),
        s1: round_to(2.0 * pivot - prev.high, 2),
        s2: round_to(pivot - range, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{Bar, IndicatorSet};
    use chrono::{Duration, TimeZone, Utc};

    fn series_from_hlc(points: &[(f64, f64, f64)]) -> BarSeries {
        let start = Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap();
        let bars = points
            .iter()
            .enumerate()
            .map(|(i, &(h, l, c))| Bar::new(start + Duration::days(i as i64), c, h, l, c, 10_000.0))
            .collect();
        BarSeries::new("SR", "1d", "unit", bars).unwrap()
    }

    /// Oscillates between two bands so swing highs cluster near 110 and lows near 90.
    fn ranging() -> Vec<(f64, f64, f64)> {
        let mut points = Vec::new();
        for cycle in 0..4 {
            let wobble = cycle as f64 * 0.1;
            points.push((100.0, 98.0, 99.0));
            points.push((110.0 + wobble, 104.0, 108.0));
            points.push((100.0, 98.0, 99.0));
            points.push((99.0, 90.0 - wobble, 92.0));
        }
        points.push((101.0, 99.0, 100.0));
        points
    }

    #[test]
    fn test_zones_cluster_swing_points() {
        let series = series_from_hlc(&ranging());
        let sr = support_resistance(&series, 30, 2);

        let support = sr.nearest_support().unwrap();
        let resistance = sr.nearest_resistance().unwrap();
        assert!((support.price - 89.85).abs() < 0.2, "{support:?}");
        assert!((resistance.price - 110.15).abs() < 0.2, "{resistance:?}");
        assert!(support.touches >= 2 && resistance.touches >= 2);
        assert_eq!(support.side, ZoneSide::Support);
    }

    #[test]
    fn test_min_touches_filters_single_extrema() {
        let series = series_from_hlc(&ranging());
        let sr = support_resistance(&series, 30, 5);
        assert!(sr.support.is_empty());
        assert!(sr.resistance.is_empty());
    }

    #[test]
    fn test_breakout_above_resistance() {
        let mut points = ranging();
        points.push((114.0, 108.0, 113.0));
        let series = series_from_hlc(&points);

        let breaks = breakouts_at_last_bar(&series, 30, 2);
        let up = breaks.resistance_break.unwrap();
        assert_eq!(up.severity, BreakoutSeverity::Strong);
        assert!(breaks.support_break.is_none());
    }

    #[test]
    fn test_moderate_break_within_one_percent() {
        let series = series_from_hlc(&[(101.0, 99.0, 100.5)]);
        let levels = SupportResistance {
            support: vec![],
            resistance: vec![Zone { price: 100.0, side: ZoneSide::Resistance, touches: 2 }],
        };
        let breaks = detect_breakouts(&series, &levels);
        assert_eq!(breaks.resistance_break.unwrap().severity, BreakoutSeverity::Moderate);
    }

    #[test]
    fn test_breakdown_below_support() {
        let mut points = ranging();
        points.push((92.0, 86.0, 87.0));
        let series = series_from_hlc(&points);

        let breaks = breakouts_at_last_bar(&series, 30, 2);
        let down = breaks.support_break.unwrap();
        assert_eq!(down.severity, BreakoutSeverity::Strong);
        assert!(down.close < down.level);
        assert!(down.distance_pct > STRONG_BREAK_PCT);
        assert!(breaks.resistance_break.is_none());
    }

    #[test]
    fn test_moderate_support_break_within_one_percent() {
        let series = series_from_hlc(&[(100.0, 99.0, 99.5)]);
        let levels = SupportResistance {
            support: vec![Zone { price: 100.0, side: ZoneSide::Support, touches: 3 }],
            resistance: vec![],
        };
        let down = detect_breakouts(&series, &levels).support_break.unwrap();
        assert_eq!(down.severity, BreakoutSeverity::Moderate);
        assert_eq!(down.distance_pct, 0.5);
    }

    #[test]
    fn test_rsi_vote_uses_configured_zones() {
        let series = series_from_hlc(&[(101.0, 99.0, 100.0), (101.0, 99.0, 100.0)]);
        let mut rows = vec![IndicatorSet::default(); 2];
        rows[1].rsi = Some(65.0);
        let annotated = AnnotatedSeries::from_parts(series, rows, vec![], vec![]);

        let default = analyze_trend(&annotated, TrendHorizon::Short);
        assert_eq!(default.signals[0].name, "RSI above 50");

        let tight = SignalThresholds { rsi_oversold: 40.0, rsi_overbought: 60.0, ..SignalThresholds::default() };
        let trend = analyze_trend_with(&annotated, TrendHorizon::Short, &tight);
        assert_eq!(trend.signals[0].name, "RSI overbought");
        assert_eq!(trend.signals[0].polarity, Polarity::Bearish);
    }

    #[test]
    fn test_daily_preset_feeds_every_trend_vote() {
        let points: Vec<(f64, f64, f64)> = (0..200)
            .map(|i| {
                let c = if i < 60 { 200.0 - i as f64 } else { 80.0 + i as f64 };
                (c + 1.0, c - 1.0, c)
            })
            .collect();
        let settings = analysis_core::settings_for_interval("1d".parse().unwrap());
        let annotated = crate::engine::compute(&series_from_hlc(&points), &settings);

        let trend = analyze_trend(&annotated, TrendHorizon::Long);
        let names: Vec<&str> = trend.signals.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"Price above SMA20"), "{names:?}");
        assert!(names.contains(&"Price above SMA50"), "{names:?}");
        assert!(names.contains(&"Price above SMA200"), "{names:?}");
    }

    #[test]
    fn test_momentum_thresholds() {
        let rising: Vec<f64> = (0..11).map(|i| 100.0 + i as f64).collect();
        assert_eq!(momentum(&rising, 10), Momentum::StronglyBullish);

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_eq!(momentum(&falling, 10), Momentum::StronglyBearish);

        // 3 up, 2 down out of 5
        let mixed = [100.0, 101.0, 100.5, 101.5, 101.0, 102.0];
        assert_eq!(momentum(&mixed, 5), Momentum::Bullish);

        // tie
        let flat = [100.0, 101.0, 100.0, 101.0, 100.0];
        assert_eq!(momentum(&flat, 4), Momentum::Neutral);
    }

    #[test]
    fn test_trend_tally_and_strength() {
        let points: Vec<(f64, f64, f64)> = (0..30).map(|i| (101.0 + i as f64, 99.0 + i as f64, 100.0 + i as f64)).collect();
        let series = series_from_hlc(&points);
        let mut rows = vec![IndicatorSet::default(); 30];
        let last = &mut rows[29];
        last.sma.insert(20, Some(120.0));
        last.sma.insert(50, Some(110.0));
        last.macd = Some(1.5);
        last.macd_signal = Some(1.0);
        last.rsi = Some(75.0);
        last.adx = Some(30.0);
        last.plus_di = Some(28.0);
        last.minus_di = Some(12.0);
        let annotated = AnnotatedSeries::from_parts(series, rows, vec![], vec![]);

        let trend = analyze_trend(&annotated, TrendHorizon::Medium);
        // SMA20, SMA50, MACD, +DI bullish; RSI overbought bearish
        assert_eq!(trend.direction, TrendDirection::Uptrend);
        assert_eq!(trend.signals.len(), 5);
        assert_eq!(trend.strength, 60.0);
        assert_eq!(trend.momentum, Momentum::StronglyBullish);
    }

    #[test]
    fn test_strength_falls_back_to_percent_change() {
        let points = [(101.0, 99.0, 100.0), (102.0, 100.0, 101.0), (103.0, 101.0, 102.0)];
        let series = series_from_hlc(&points);
        let annotated = AnnotatedSeries::from_parts(series, vec![], vec![], vec![]);

        let trend = analyze_trend(&annotated, TrendHorizon::Short);
        assert_eq!(trend.direction, TrendDirection::Sideways);
        assert_eq!(trend.percent_change, 2.0);
        assert_eq!(trend.strength, 20.0);
        assert!(trend.adx.is_none());
    }

    #[test]
    fn test_pivot_points_from_previous_bar() {
        let series = series_from_hlc(&[(110.0, 90.0, 100.0), (105.0, 95.0, 101.0)]);
        let pivots = pivot_points(&series).unwrap();
        assert_eq!(pivots.pivot, 100.0);
        assert_eq!(pivots.r1, 110.0);
        assert_eq!(pivots.s1, 90.0);
        assert_eq!(pivots.r2, 120.0);
        assert_eq!(pivots.s2, 80.0);

        let single = series_from_hlc(&[(110.0, 90.0, 100.0)]);
        assert!(pivot_points(&single).is_none());
    }
}
