//! Indicator math over raw price arrays.
//!
//! Every function returns a line aligned with its input: element `i` belongs
//! to bar `i`, and `None` marks bars without enough history. Values are full
//! precision; rounding happens in the engine.

use analysis_core::stats::{mean, population_std_dev};
use analysis_core::Bar;

/// An indicator line aligned bar-for-bar with the series it was computed from.
pub type Line = Vec<Option<f64>>;

/// Substituted for a zero denominator in RSI and MFI.
pub const EPSILON: f64 = 1e-4;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Line {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period {
        return result;
    }

    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result[i] = Some(sum / period as f64);
    }
    result
}

/// SMA over a line with undefined stretches; a window containing `None` is undefined.
pub fn sma_line(values: &[Option<f64>], period: usize) -> Line {
    let mut result = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return result;
    }

    for i in period - 1..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().all(Option::is_some) {
            let sum: f64 = window.iter().flatten().sum();
            result[i] = Some(sum / period as f64);
        }
    }
    result
}

/// Exponential Moving Average, seeded with the SMA of the first `period` values.
pub fn ema(data: &[f64], period: usize) -> Line {
    let values: Line = data.iter().copied().map(Some).collect();
    ema_line(&values, period)
}

/// EMA over a line with a leading undefined stretch (e.g. the MACD line).
///
/// The seed is the mean of the first `period` defined values. A `None` after
/// the seed restarts seeding.
pub fn ema_line(values: &[Option<f64>], period: usize) -> Line {
    let mut result = vec![None; values.len()];
    if period == 0 {
        return result;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev: Option<f64> = None;
    let mut seed: Vec<f64> = Vec::with_capacity(period);

    for (i, value) in values.iter().enumerate() {
        match (*value, prev) {
            (None, _) => {
                prev = None;
                seed.clear();
            }
            (Some(x), Some(p)) => {
                let e = x * k + p * (1.0 - k);
                result[i] = Some(e);
                prev = Some(e);
            }
            (Some(x), None) => {
                seed.push(x);
                if seed.len() == period {
                    let e = seed.iter().sum::<f64>() / period as f64;
                    result[i] = Some(e);
                    prev = Some(e);
                    seed.clear();
                }
            }
        }
    }
    result
}

/// Relative Strength Index over a rolling window of close-to-close changes.
///
/// An average loss of exactly zero is replaced by [`EPSILON`]; output is clamped to [0, 100].
pub fn rsi(data: &[f64], period: usize) -> Line {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 {
        return result;
    }

    let mut gains = vec![0.0; data.len()];
    let mut losses = vec![0.0; data.len()];
    for i in 1..data.len() {
        let change = data[i] - data[i - 1];
        if change > 0.0 {
            gains[i] = change;
        } else {
            losses[i] = change.abs();
        }
    }

    for i in period..data.len() {
        let avg_gain = gains[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
        let mut avg_loss = losses[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
        if avg_loss == 0.0 {
            avg_loss = EPSILON;
        }

        let rs = avg_gain / avg_loss;
        let value = 100.0 - (100.0 / (1.0 + rs));
        result[i] = Some(value.clamp(0.0, 100.0));
    }

    result
}

/// MACD (Moving Average Convergence Divergence)
pub struct MacdResult {
    pub macd_line: Line,
    pub signal_line: Line,
    pub histogram: Line,
}

pub fn macd(data: &[f64], fast_period: usize, slow_period: usize, signal_period: usize) -> MacdResult {
    let n = data.len();
    if fast_period == 0 || signal_period == 0 || slow_period <= fast_period {
        return MacdResult {
            macd_line: vec![None; n],
            signal_line: vec![None; n],
            histogram: vec![None; n],
        };
    }

    let ema_fast = ema(data, fast_period);
    let ema_slow = ema(data, slow_period);

    let macd_line: Line = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal_line = ema_line(&macd_line, signal_period);

    let histogram: Line = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    MacdResult {
        macd_line,
        signal_line,
        histogram,
    }
}

/// Bollinger Bands
pub struct BollingerBands {
    pub upper: Line,
    pub middle: Line,
    pub lower: Line,
}

/// Bands at `std_dev` population standard deviations around the SMA.
pub fn bollinger_bands(data: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let middle = sma(data, period);
    let mut upper = vec![None; data.len()];
    let mut lower = vec![None; data.len()];

    for (i, mid) in middle.iter().enumerate() {
        if let Some(mean) = mid {
            let std = population_std_dev(&data[i + 1 - period..=i]);
            upper[i] = Some(mean + std_dev * std);
            lower[i] = Some(mean - std_dev * std);
        }
    }

    BollingerBands { upper, middle, lower }
}

/// True range per bar; the first bar has no previous close and uses high - low.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let high_low = bar.high - bar.low;
            if i == 0 {
                return high_low;
            }
            let prev_close = bars[i - 1].close;
            let high_close = (bar.high - prev_close).abs();
            let low_close = (bar.low - prev_close).abs();
            high_low.max(high_close).max(low_close)
        })
        .collect()
}

/// Average True Range as a rolling mean of true range.
pub fn atr(bars: &[Bar], period: usize) -> Line {
    sma(&true_range(bars), period)
}

/// Stochastic Oscillator
pub struct StochasticResult {
    pub k: Line,
    pub d: Line,
}

/// Slow stochastic: raw %K over `k_period`, smoothed by `k_slowing`, %D over `d_period`.
pub fn stochastic(bars: &[Bar], k_period: usize, k_slowing: usize, d_period: usize) -> StochasticResult {
    let mut raw_k = vec![None; bars.len()];
    if k_period > 0 && bars.len() >= k_period {
        for i in k_period - 1..bars.len() {
            let slice = &bars[i + 1 - k_period..=i];
            let highest = slice.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
            let lowest = slice.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

            let k = if highest == lowest {
                50.0
            } else {
                100.0 * (bars[i].close - lowest) / (highest - lowest)
            };
            raw_k[i] = Some(k);
        }
    }

    let k = sma_line(&raw_k, k_slowing);
    let d = sma_line(&k, d_period);

    StochasticResult { k, d }
}

/// On-Balance Volume
pub fn obv(bars: &[Bar]) -> Line {
    let mut obv_values: Vec<f64> = Vec::with_capacity(bars.len());

    for (i, bar) in bars.iter().enumerate() {
        let value = match i.checked_sub(1).map(|p| &bars[p]) {
            None => bar.volume,
            Some(prev) => {
                let prev_obv = obv_values[i - 1];
                if bar.close > prev.close {
                    prev_obv + bar.volume
                } else if bar.close < prev.close {
                    prev_obv - bar.volume
                } else {
                    prev_obv
                }
            }
        };
        obv_values.push(value);
    }

    obv_values.into_iter().map(Some).collect()
}

/// Average Directional Index (ADX): measures trend strength (0-100)
pub struct AdxResult {
    pub adx: Line,
    pub plus_di: Line,
    pub minus_di: Line,
}

/// Wilder's ADX. +DI/-DI are defined from bar `period`, ADX from bar `2 * period - 1`.
pub fn adx(bars: &[Bar], period: usize) -> AdxResult {
    let n = bars.len();
    let mut adx_values = vec![None; n];
    let mut plus_di_values = vec![None; n];
    let mut minus_di_values = vec![None; n];

    if period == 0 || n < period * 2 {
        return AdxResult {
            adx: adx_values,
            plus_di: plus_di_values,
            minus_di: minus_di_values,
        };
    }

    // Directional movement and true range; index 0 is unused.
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    let tr = true_range(bars);

    for i in 1..n {
        let up_move = bars[i].high - bars[i - 1].high;
        let down_move = bars[i - 1].low - bars[i].low;

        plus_dm[i] = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        minus_dm[i] = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
    }

    let mut smoothed_plus_dm: f64 = plus_dm[1..=period].iter().sum();
    let mut smoothed_minus_dm: f64 = minus_dm[1..=period].iter().sum();
    let mut smoothed_tr: f64 = tr[1..=period].iter().sum();
    let mut dx_values = vec![0.0; n];

    for i in period..n {
        if i > period {
            smoothed_plus_dm = smoothed_plus_dm - smoothed_plus_dm / period as f64 + plus_dm[i];
            smoothed_minus_dm = smoothed_minus_dm - smoothed_minus_dm / period as f64 + minus_dm[i];
            smoothed_tr = smoothed_tr - smoothed_tr / period as f64 + tr[i];
        }

        let pdi = if smoothed_tr > 0.0 { 100.0 * smoothed_plus_dm / smoothed_tr } else { 0.0 };
        let mdi = if smoothed_tr > 0.0 { 100.0 * smoothed_minus_dm / smoothed_tr } else { 0.0 };
        plus_di_values[i] = Some(pdi);
        minus_di_values[i] = Some(mdi);

        let di_sum = pdi + mdi;
        dx_values[i] = if di_sum > 0.0 { 100.0 * (pdi - mdi).abs() / di_sum } else { 0.0 };
    }

    // Smooth DX into ADX
    let first = 2 * period - 1;
    let mut adx_val = dx_values[period..=first].iter().sum::<f64>() / period as f64;
    adx_values[first] = Some(adx_val);

    for i in first + 1..n {
        adx_val = (adx_val * (period - 1) as f64 + dx_values[i]) / period as f64;
        adx_values[i] = Some(adx_val);
    }

    AdxResult {
        adx: adx_values,
        plus_di: plus_di_values,
        minus_di: minus_di_values,
    }
}

/// Commodity Channel Index over the typical price.
pub fn cci(bars: &[Bar], period: usize) -> Line {
    let mut result = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return result;
    }

    let typical: Vec<f64> = bars.iter().map(Bar::typical_price).collect();
    for i in period - 1..bars.len() {
        let window = &typical[i + 1 - period..=i];
        let avg = mean(window);
        let mean_dev = window.iter().map(|tp| (tp - avg).abs()).sum::<f64>() / period as f64;

        result[i] = Some(if mean_dev == 0.0 {
            0.0
        } else {
            (typical[i] - avg) / (0.015 * mean_dev)
        });
    }
    result
}

/// Money Flow Index over `period` typical-price changes.
///
/// Zero negative flow is replaced by [`EPSILON`]; output is clamped to [0, 100].
pub fn mfi(bars: &[Bar], period: usize) -> Line {
    let mut result = vec![None; bars.len()];
    if period == 0 || bars.len() < period + 1 {
        return result;
    }

    let typical: Vec<f64> = bars.iter().map(Bar::typical_price).collect();
    let mut positive = vec![0.0; bars.len()];
    let mut negative = vec![0.0; bars.len()];
    for i in 1..bars.len() {
        let flow = typical[i] * bars[i].volume;
        if typical[i] > typical[i - 1] {
            positive[i] = flow;
        } else if typical[i] < typical[i - 1] {
            negative[i] = flow;
        }
    }

    for i in period..bars.len() {
        let pos: f64 = positive[i + 1 - period..=i].iter().sum();
        let mut neg: f64 = negative[i + 1 - period..=i].iter().sum();
        if neg == 0.0 {
            neg = EPSILON;
        }
        let ratio = pos / neg;
        let value = 100.0 - 100.0 / (1.0 + ratio);
        result[i] = Some(value.clamp(0.0, 100.0));
    }
    result
}

/// Volume-Weighted Average Price, cumulative from the first bar.
pub fn vwap(bars: &[Bar]) -> Line {
    let mut vwap_values = Vec::with_capacity(bars.len());
    let mut cumulative_tpv = 0.0;
    let mut cumulative_volume = 0.0;

    for bar in bars {
        let typical_price = bar.typical_price();
        cumulative_tpv += typical_price * bar.volume;
        cumulative_volume += bar.volume;

        let vwap = if cumulative_volume > 0.0 {
            cumulative_tpv / cumulative_volume
        } else {
            typical_price
        };

        vwap_values.push(Some(vwap));
    }

    vwap_values
}
