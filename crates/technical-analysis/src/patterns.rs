use analysis_core::{Bar, BarSeries, Occurrence, Polarity};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Relative tolerance for matching lows (tweezer bottom) or highs (tweezer top).
const TWEEZER_TOLERANCE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Doji,
    Hammer,
    HangingMan,
    InvertedHammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
    PiercingLine,
    DarkCloudCover,
    BullishHarami,
    BearishHarami,
    TweezerBottom,
    TweezerTop,
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
}

impl PatternKind {
    pub const ALL: [PatternKind; 17] = [
        PatternKind::Doji,
        PatternKind::Hammer,
        PatternKind::HangingMan,
        PatternKind::InvertedHammer,
        PatternKind::ShootingStar,
        PatternKind::BullishEngulfing,
        PatternKind::BearishEngulfing,
        PatternKind::PiercingLine,
        PatternKind::DarkCloudCover,
        PatternKind::BullishHarami,
        PatternKind::BearishHarami,
        PatternKind::TweezerBottom,
        PatternKind::TweezerTop,
        PatternKind::MorningStar,
        PatternKind::EveningStar,
        PatternKind::ThreeWhiteSoldiers,
        PatternKind::ThreeBlackCrows,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PatternKind::Doji => "doji",
            PatternKind::Hammer => "hammer",
            PatternKind::HangingMan => "hanging_man",
            PatternKind::InvertedHammer => "inverted_hammer",
            PatternKind::ShootingStar => "shooting_star",
            PatternKind::BullishEngulfing => "bullish_engulfing",
            PatternKind::BearishEngulfing => "bearish_engulfing",
            PatternKind::PiercingLine => "piercing_line",
            PatternKind::DarkCloudCover => "dark_cloud_cover",
            PatternKind::BullishHarami => "bullish_harami",
            PatternKind::BearishHarami => "bearish_harami",
            PatternKind::TweezerBottom => "tweezer_bottom",
            PatternKind::TweezerTop => "tweezer_top",
            PatternKind::MorningStar => "morning_star",
            PatternKind::EveningStar => "evening_star",
            PatternKind::ThreeWhiteSoldiers => "three_white_soldiers",
            PatternKind::ThreeBlackCrows => "three_black_crows",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    pub fn polarity(&self) -> Polarity {
        match self {
            PatternKind::Doji => Polarity::Neutral,
            PatternKind::Hammer
            | PatternKind::InvertedHammer
            | PatternKind::BullishEngulfing
            | PatternKind::PiercingLine
            | PatternKind::BullishHarami
            | PatternKind::TweezerBottom
            | PatternKind::MorningStar
            | PatternKind::ThreeWhiteSoldiers => Polarity::Bullish,
            PatternKind::HangingMan
            | PatternKind::ShootingStar
            | PatternKind::BearishEngulfing
            | PatternKind::DarkCloudCover
            | PatternKind::BearishHarami
            | PatternKind::TweezerTop
            | PatternKind::EveningStar
            | PatternKind::ThreeBlackCrows => Polarity::Bearish,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PatternKind::Doji => "A doji candlestick pattern, indicating indecision in the market.",
            PatternKind::Hammer => "A hammer pattern, potentially signaling a bottom.",
            PatternKind::HangingMan => "A hanging man pattern, potentially signaling a top.",
            PatternKind::InvertedHammer => "An inverted hammer pattern, potentially signaling a bottom.",
            PatternKind::ShootingStar => "A shooting star pattern, suggesting a potential bearish reversal.",
            PatternKind::BullishEngulfing => "A bullish engulfing pattern, suggesting a potential upward reversal.",
            PatternKind::BearishEngulfing => "A bearish engulfing pattern, suggesting a potential downward reversal.",
            PatternKind::PiercingLine => "A piercing line pattern, suggesting buyers are regaining control.",
            PatternKind::DarkCloudCover => "A dark cloud cover pattern, suggesting sellers are regaining control.",
            PatternKind::BullishHarami => "A bullish harami pattern, indicating selling pressure is fading.",
            PatternKind::BearishHarami => "A bearish harami pattern, indicating buying pressure is fading.",
            PatternKind::TweezerBottom => "A tweezer bottom pattern, suggesting a bullish reversal.",
            PatternKind::TweezerTop => "A tweezer top pattern, suggesting a bearish reversal.",
            PatternKind::MorningStar => "A morning star pattern, a strong bullish reversal signal.",
            PatternKind::EveningStar => "An evening star pattern, a strong bearish reversal signal.",
            PatternKind::ThreeWhiteSoldiers => "Three white soldiers pattern, indicating a strong bullish trend.",
            PatternKind::ThreeBlackCrows => "Three black crows pattern, indicating a strong bearish trend.",
        }
    }

    pub fn occurrence(&self, index: usize) -> Occurrence {
        Occurrence::new(index, self.name(), self.polarity(), self.description())
    }
}

/// Body at least half of the candle's range.
fn is_long(bar: &Bar) -> bool {
    bar.range() > 0.0 && bar.body() >= 0.5 * bar.range()
}

fn is_doji(bar: &Bar) -> bool {
    bar.range() > 0.0 && bar.body() <= 0.1 * bar.range()
}

/// Small body, long lower wick, almost no upper wick.
fn has_hammer_shape(bar: &Bar) -> bool {
    let range = bar.range();
    range > 0.0
        && bar.body() <= 0.3 * range
        && bar.lower_wick() >= 2.0 * bar.body()
        && bar.upper_wick() <= 0.1 * range
}

/// Small body, long upper wick, almost no lower wick.
fn has_inverted_shape(bar: &Bar) -> bool {
    let range = bar.range();
    range > 0.0
        && bar.body() <= 0.3 * range
        && bar.upper_wick() >= 2.0 * bar.body()
        && bar.lower_wick() <= 0.1 * range
}

fn single_bar(bars: &[Bar], i: usize, found: &mut Vec<PatternKind>) {
    let bar = &bars[i];

    if is_doji(bar) {
        found.push(PatternKind::Doji);
    }

    if has_hammer_shape(bar) {
        if bar.is_bullish() {
            found.push(PatternKind::Hammer);
        } else {
            found.push(PatternKind::HangingMan);
        }
    }

    // Upper-wick shapes are read against the candle before them
    if i >= 1 && has_inverted_shape(bar) {
        let prev = &bars[i - 1];
        if prev.is_bullish() {
            found.push(PatternKind::ShootingStar);
        } else if prev.is_bearish() {
            found.push(PatternKind::InvertedHammer);
        }
    }
}

fn two_bar(prev: &Bar, curr: &Bar, found: &mut Vec<PatternKind>) {
    // Engulfing: opposite colors, current body covers the previous one and is larger
    if prev.is_bearish()
        && curr.is_bullish()
        && curr.open <= prev.close
        && curr.close >= prev.open
        && curr.body() > prev.body()
    {
        found.push(PatternKind::BullishEngulfing);
    }
    if prev.is_bullish()
        && curr.is_bearish()
        && curr.open >= prev.close
        && curr.close <= prev.open
        && curr.body() > prev.body()
    {
        found.push(PatternKind::BearishEngulfing);
    }

    // Piercing line / dark cloud cover: opens beyond the prior close, recovers past its midpoint
    if is_long(prev)
        && prev.is_bearish()
        && curr.is_bullish()
        && curr.open < prev.close
        && curr.close > prev.midpoint()
        && curr.close < prev.open
    {
        found.push(PatternKind::PiercingLine);
    }
    if is_long(prev)
        && prev.is_bullish()
        && curr.is_bearish()
        && curr.open > prev.close
        && curr.close < prev.midpoint()
        && curr.close > prev.open
    {
        found.push(PatternKind::DarkCloudCover);
    }

    // Harami: current body strictly inside a long previous body of the opposite color
    let inside = curr.body_top() < prev.body_top() && curr.body_bottom() > prev.body_bottom();
    if inside && is_long(prev) {
        if prev.is_bearish() && curr.is_bullish() {
            found.push(PatternKind::BullishHarami);
        }
        if prev.is_bullish() && curr.is_bearish() {
            found.push(PatternKind::BearishHarami);
        }
    }

    if prev.is_bearish() && curr.is_bullish() && (curr.low - prev.low).abs() <= TWEEZER_TOLERANCE * prev.low.abs() {
        found.push(PatternKind::TweezerBottom);
    }
    if prev.is_bullish() && curr.is_bearish() && (curr.high - prev.high).abs() <= TWEEZER_TOLERANCE * prev.high.abs() {
        found.push(PatternKind::TweezerTop);
    }
}

fn three_bar(first: &Bar, middle: &Bar, last: &Bar, found: &mut Vec<PatternKind>) {
    let small_middle = middle.body() <= 0.5 * first.body();

    if is_long(first)
        && first.is_bearish()
        && small_middle
        && middle.body_top() < first.body_bottom()
        && is_long(last)
        && last.is_bullish()
        && last.close > first.midpoint()
    {
        found.push(PatternKind::MorningStar);
    }

    if is_long(first)
        && first.is_bullish()
        && small_middle
        && middle.body_bottom() > first.body_top()
        && is_long(last)
        && last.is_bearish()
        && last.close < first.midpoint()
    {
        found.push(PatternKind::EveningStar);
    }

    let candles = [first, middle, last];
    let soldiers = candles.iter().all(|b| b.is_bullish())
        && candles.windows(2).all(|w| {
            let (a, b) = (w[0], w[1]);
            b.open >= a.open && b.open <= a.close && b.close > a.close
        });
    if soldiers {
        found.push(PatternKind::ThreeWhiteSoldiers);
    }

    let crows = candles.iter().all(|b| b.is_bearish())
        && candles.windows(2).all(|w| {
            let (a, b) = (w[0], w[1]);
            b.open <= a.open && b.open >= a.close && b.close < a.close
        });
    if crows {
        found.push(PatternKind::ThreeBlackCrows);
    }
}

/// Patterns completing at bar `i`, using up to two preceding bars.
pub fn patterns_at(bars: &[Bar], i: usize) -> Vec<PatternKind> {
    let mut found = Vec::new();
    if i >= bars.len() {
        return found;
    }

    single_bar(bars, i, &mut found);
    if i >= 1 {
        two_bar(&bars[i - 1], &bars[i], &mut found);
    }
    if i >= 2 {
        three_bar(&bars[i - 2], &bars[i - 1], &bars[i], &mut found);
    }
    found
}

/// Scan a series for candlestick patterns.
///
/// With `window`, only the last `window` bars are scanned as pattern ends;
/// earlier bars still serve as the preceding candles. Every match is kept,
/// ordered by bar index and then pattern name.
pub fn detect(series: &BarSeries, window: Option<usize>) -> Vec<Occurrence> {
    let bars = series.bars();
    let start = window.map_or(0, |w| bars.len().saturating_sub(w));

    let mut occurrences: Vec<Occurrence> = (start..bars.len())
        .flat_map(|i| patterns_at(bars, i).into_iter().map(move |p| p.occurrence(i)))
        .collect();
    occurrences.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.name.cmp(&b.name)));

    debug!(symbol = series.symbol(), scanned = bars.len() - start, found = occurrences.len(), "pattern scan");
    occurrences
}
