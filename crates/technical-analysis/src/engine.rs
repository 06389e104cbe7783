use analysis_core::stats::round_to;
use analysis_core::{AnnotatedSeries, BarSeries, IndicatorSet, IndicatorSettings};
use tracing::{debug, warn};

use crate::indicators::{self, Line};

/// Decimal places kept in published indicator values.
pub const OUTPUT_DECIMALS: i32 = 2;

/// Collects computed groups and omission warnings while filling rows.
struct Annotator {
    symbol: String,
    len: usize,
    rows: Vec<IndicatorSet>,
    computed: Vec<String>,
    warnings: Vec<String>,
}

impl Annotator {
    fn new(series: &BarSeries) -> Self {
        Self {
            symbol: series.symbol().to_string(),
            len: series.len(),
            rows: vec![IndicatorSet::default(); series.len()],
            computed: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Decide whether `group` can be computed. Records a warning when not.
    fn admit(&mut self, group: &str, settings_ok: bool, min_bars: usize) -> bool {
        let reason = if !settings_ok {
            Some("invalid settings".to_string())
        } else if self.len < min_bars {
            Some(format!("need {min_bars} bars, have {}", self.len))
        } else {
            None
        };

        match reason {
            Some(reason) => {
                warn!(symbol = %self.symbol, indicator = group, %reason, "indicator omitted");
                self.warnings.push(format!("{group} omitted: {reason}"));
                false
            }
            None => {
                debug!(symbol = %self.symbol, indicator = group, "indicator computed");
                self.computed.push(group.to_string());
                true
            }
        }
    }

    fn fill(&mut self, line: &Line, mut set: impl FnMut(&mut IndicatorSet, Option<f64>)) {
        for (row, value) in self.rows.iter_mut().zip(line.iter()) {
            set(row, value.map(|v| round_to(v, OUTPUT_DECIMALS)));
        }
    }

    fn finish(self, series: &BarSeries) -> AnnotatedSeries {
        AnnotatedSeries::from_parts(series.clone(), self.rows, self.computed, self.warnings)
    }
}

/// Annotate every bar with the configured indicators.
///
/// Indicators whose minimum history exceeds the series length, or whose
/// settings are unusable, are left out for the whole series and listed in
/// [`AnnotatedSeries::warnings`]. Never fails.
pub fn compute(series: &BarSeries, settings: &IndicatorSettings) -> AnnotatedSeries {
    let closes = series.closes();
    let bars = series.bars();
    let mut out = Annotator::new(series);

    let mut sma_periods = settings.sma.clone();
    sma_periods.sort_unstable();
    sma_periods.dedup();
    for period in sma_periods {
        if out.admit(&format!("sma_{period}"), period > 0, period) {
            let line = indicators::sma(&closes, period);
            out.fill(&line, |row, v| {
                row.sma.insert(period, v);
            });
        }
    }

    let mut ema_periods = settings.ema.clone();
    ema_periods.sort_unstable();
    ema_periods.dedup();
    for period in ema_periods {
        if out.admit(&format!("ema_{period}"), period > 0, period) {
            let line = indicators::ema(&closes, period);
            out.fill(&line, |row, v| {
                row.ema.insert(period, v);
            });
        }
    }

    let m = settings.macd;
    if out.admit("macd", m.fast > 0 && m.signal > 0 && m.fast < m.slow, (m.slow + m.signal).saturating_sub(1)) {
        let result = indicators::macd(&closes, m.fast, m.slow, m.signal);
        out.fill(&result.macd_line, |row, v| row.macd = v);
        out.fill(&result.signal_line, |row, v| row.macd_signal = v);
        out.fill(&result.histogram, |row, v| row.macd_hist = v);
    }

    if out.admit("rsi", settings.rsi > 0, settings.rsi + 1) {
        out.fill(&indicators::rsi(&closes, settings.rsi), |row, v| row.rsi = v);
    }

    let bb = settings.bollinger;
    if out.admit("bollinger", bb.period > 0 && bb.std_dev.is_finite() && bb.std_dev >= 0.0, bb.period) {
        let bands = indicators::bollinger_bands(&closes, bb.period, bb.std_dev);
        out.fill(&bands.upper, |row, v| row.bb_upper = v);
        out.fill(&bands.middle, |row, v| row.bb_middle = v);
        out.fill(&bands.lower, |row, v| row.bb_lower = v);
    }

    if out.admit("atr", settings.atr > 0, settings.atr) {
        out.fill(&indicators::atr(bars, settings.atr), |row, v| row.atr = v);
    }

    let st = settings.stochastic;
    let stoch_ok = st.k_period > 0 && st.k_slowing > 0 && st.d_period > 0;
    let stoch_min = (st.k_period + st.k_slowing + st.d_period).saturating_sub(2);
    if out.admit("stochastic", stoch_ok, stoch_min) {
        let result = indicators::stochastic(bars, st.k_period, st.k_slowing, st.d_period);
        out.fill(&result.k, |row, v| row.stoch_k = v);
        out.fill(&result.d, |row, v| row.stoch_d = v);
    }

    if out.admit("adx", settings.adx > 0, settings.adx * 2) {
        let result = indicators::adx(bars, settings.adx);
        out.fill(&result.adx, |row, v| row.adx = v);
        out.fill(&result.plus_di, |row, v| row.plus_di = v);
        out.fill(&result.minus_di, |row, v| row.minus_di = v);
    }

    if out.admit("cci", settings.cci > 0, settings.cci) {
        out.fill(&indicators::cci(bars, settings.cci), |row, v| row.cci = v);
    }

    if out.admit("mfi", settings.mfi > 0, settings.mfi + 1) {
        out.fill(&indicators::mfi(bars, settings.mfi), |row, v| row.mfi = v);
    }

    if out.admit("obv", true, 1) {
        out.fill(&indicators::obv(bars), |row, v| row.obv = v);
    }

    if out.admit("cum_vwap", true, 1) {
        out.fill(&indicators::vwap(bars), |row, v| row.cum_vwap = v);
    }

    out.finish(series)
}
