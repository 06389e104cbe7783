#[cfg(test)]
mod tests {
    use super::super::indicators::*;
    use crate::engine::compute;
    use crate::structure::support_resistance;
    use analysis_core::{Bar, BarSeries, IndicatorSettings};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    // Helper function to create sample price data
    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ]
    }

    // Helper function to create sample bars
    fn sample_bars() -> Vec<Bar> {
        let prices = vec![
            (100.0, 102.0, 99.0, 101.0),
            (101.0, 103.0, 100.0, 102.0),
            (102.0, 104.0, 101.0, 103.0),
            (103.0, 105.0, 102.0, 104.0),
            (104.0, 106.0, 103.0, 105.0),
            (105.0, 107.0, 104.0, 106.0),
            (106.0, 108.0, 105.0, 107.0),
            (107.0, 109.0, 106.0, 108.0),
            (108.0, 110.0, 107.0, 109.0),
            (109.0, 111.0, 108.0, 110.0),
            (110.0, 112.0, 109.0, 111.0),
            (111.0, 113.0, 110.0, 112.0),
            (112.0, 114.0, 111.0, 113.0),
            (113.0, 115.0, 112.0, 114.0),
            (114.0, 116.0, 113.0, 115.0),
        ];

        prices
            .into_iter()
            .enumerate()
            .map(|(i, (open, high, low, close))| {
                Bar::new(start() + Duration::days(i as i64), open, high, low, close, 1000000.0)
            })
            .collect()
    }

    fn series_from_closes(closes: &[f64]) -> BarSeries {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start() + Duration::minutes(i as i64), c, c * 1.01, c * 0.99, c, 1_000.0))
            .collect();
        BarSeries::new("PROP", "1m", "proptest", bars).unwrap()
    }

    fn defined(line: &Line) -> Vec<f64> {
        line.iter().flatten().copied().collect()
    }

    #[test]
    fn test_sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), 5);
        assert!(result[0].is_none() && result[1].is_none());
        assert!((result[2].unwrap() - 2.0).abs() < 0.001); // (1+2+3)/3 = 2
        assert!((result[3].unwrap() - 3.0).abs() < 0.001); // (2+3+4)/3 = 3
        assert!((result[4].unwrap() - 4.0).abs() < 0.001); // (3+4+5)/3 = 4
    }

    #[test]
    fn test_sma_insufficient_data() {
        let data = vec![1.0, 2.0];
        let result = sma(&data, 5);

        assert_eq!(result, vec![None, None]);
    }

    #[test]
    fn test_sma_real_prices() {
        let prices = sample_prices();
        let result = sma(&prices, 5);

        let expected_first = (44.34 + 44.09 + 44.15 + 43.61 + 44.33) / 5.0;
        assert!((result[4].unwrap() - expected_first).abs() < 0.01);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let data = vec![22.0, 24.0, 23.0, 25.0, 26.0];
        let result = ema(&data, 3);

        assert_eq!(result.len(), data.len());
        assert!(result[1].is_none());
        let first_sma = (22.0 + 24.0 + 23.0) / 3.0;
        assert!((result[2].unwrap() - first_sma).abs() < 1e-9);
        // k = 0.5
        assert!((result[3].unwrap() - (25.0 * 0.5 + first_sma * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_ema_increases_with_uptrend() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let result = defined(&ema(&data, 3));

        assert_eq!(result.len(), 8);
        for i in 1..result.len() {
            assert!(result[i] > result[i - 1]);
        }
    }

    #[test]
    fn test_ema_line_skips_leading_gap() {
        let line = vec![None, None, Some(1.0), Some(2.0), Some(3.0), Some(4.0)];
        let result = ema_line(&line, 2);

        assert_eq!(result[2], None);
        assert_eq!(result[3], Some(1.5));
        assert!((result[4].unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_rsi_basic() {
        let prices = sample_prices();
        let result = rsi(&prices, 14);

        assert!(result[13].is_none());
        assert!(result[14].is_some());
        for value in defined(&result) {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let data = vec![1.0, 2.0, 3.0];
        let result = rsi(&data, 14);

        assert!(result.iter().all(Option::is_none));
    }

    #[test]
    fn test_rsi_overbought_oversold() {
        let uptrend: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let up = rsi(&uptrend, 14);
        assert!(up.last().unwrap().unwrap() > 70.0);

        let downtrend: Vec<f64> = uptrend.iter().rev().copied().collect();
        let down = rsi(&downtrend, 14);
        assert!(down.last().unwrap().unwrap() < 30.0);
    }

    #[test]
    fn test_macd_histogram() {
        let prices: Vec<f64> = (0..50).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let result = macd(&prices, 12, 26, 9);

        assert!(result.macd_line[24].is_none());
        assert!(result.macd_line[25].is_some());
        assert!(result.signal_line[32].is_none());
        assert!(result.signal_line[33].is_some());

        for i in 0..prices.len() {
            if let (Some(m), Some(s), Some(h)) = (result.macd_line[i], result.signal_line[i], result.histogram[i]) {
                assert!((h - (m - s)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        let prices = sample_prices();
        let result = macd(&prices, 26, 12, 9);
        assert!(result.macd_line.iter().all(Option::is_none));
    }

    #[test]
    fn test_bollinger_bands_ordering() {
        let prices = sample_prices();
        let result = bollinger_bands(&prices, 10, 2.0);

        for i in 9..prices.len() {
            assert!(result.upper[i].unwrap() > result.middle[i].unwrap());
            assert!(result.middle[i].unwrap() > result.lower[i].unwrap());
        }
    }

    #[test]
    fn test_bollinger_bands_width() {
        let prices = vec![100.0; 20]; // Constant prices
        let result = bollinger_bands(&prices, 10, 2.0);

        for i in 9..prices.len() {
            assert_eq!(result.upper[i], result.lower[i]);
        }
    }

    #[test]
    fn test_atr_basic() {
        let bars = sample_bars();
        let result = atr(&bars, 14);

        assert!(result[12].is_none());
        // every bar spans 3 and gaps no further than that
        assert!((result[13].unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_atr_increases_with_volatility() {
        let bars = sample_bars();
        let normal_atr = atr(&bars, 5);

        let mut volatile_bars = sample_bars();
        for bar in &mut volatile_bars {
            bar.high += 10.0;
            bar.low -= 10.0;
        }
        let volatile_atr = atr(&volatile_bars, 5);

        assert!(volatile_atr[4].unwrap() > normal_atr[4].unwrap());
    }

    #[test]
    fn test_obv_increases_on_up_days() {
        let bars = sample_bars();
        let result = defined(&obv(&bars));

        assert_eq!(result.len(), bars.len());
        for i in 1..result.len() {
            assert!(result[i] > result[i - 1]);
        }
    }

    #[test]
    fn test_obv_decreases_on_down_days() {
        let mut bars = sample_bars();
        bars.reverse();
        let result = defined(&obv(&bars));

        for i in 1..result.len() {
            assert!(result[i] < result[i - 1]);
        }
    }

    #[test]
    fn test_vwap_within_traded_range() {
        let bars = sample_bars();
        let result = defined(&vwap(&bars));

        let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(result.len(), bars.len());
        for value in result {
            assert!(value >= low && value <= high);
        }
    }

    #[test]
    fn test_vwap_with_zero_volume() {
        let mut bars = sample_bars();
        bars[0].volume = 0.0;
        let result = vwap(&bars);

        assert!((result[0].unwrap() - bars[0].typical_price()).abs() < 1e-9);
    }

    #[test]
    fn test_stochastic_basic() {
        let bars = sample_bars();
        let result = stochastic(&bars, 5, 3, 3);

        // raw %K from 4, slowed %K from 6, %D from 8
        assert!(result.k[5].is_none() && result.k[6].is_some());
        assert!(result.d[7].is_none() && result.d[8].is_some());
        for value in defined(&result.k).into_iter().chain(defined(&result.d)) {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_stochastic_flat_window_is_fifty() {
        let bars: Vec<Bar> = (0..10)
            .map(|i| Bar::new(start() + Duration::days(i), 50.0, 50.0, 50.0, 50.0, 10.0))
            .collect();
        let result = stochastic(&bars, 5, 1, 1);
        assert_eq!(result.k[9], Some(50.0));
    }

    #[test]
    fn test_adx_warmup_and_direction() {
        let bars: Vec<Bar> = (0..40)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                Bar::new(start() + Duration::days(i), base, base + 1.5, base - 0.5, base + 1.0, 500.0)
            })
            .collect();
        let result = adx(&bars, 14);

        assert!(result.plus_di[13].is_none() && result.plus_di[14].is_some());
        assert!(result.adx[26].is_none() && result.adx[27].is_some());
        assert!(result.plus_di[39].unwrap() > result.minus_di[39].unwrap());
        assert!(result.adx[39].unwrap() > 25.0);
    }

    #[test]
    fn test_cci_zero_deviation() {
        let bars: Vec<Bar> = (0..25)
            .map(|i| Bar::new(start() + Duration::days(i), 10.0, 11.0, 9.0, 10.0, 100.0))
            .collect();
        let result = cci(&bars, 20);
        assert!(result[18].is_none());
        assert_eq!(result[24], Some(0.0));
    }

    #[test]
    fn test_mfi_rising_typical_price_is_high() {
        let bars = sample_bars();
        let result = mfi(&bars, 10);

        assert!(result[9].is_none());
        let last = result[14].unwrap();
        assert!(last > 90.0 && last <= 100.0);
    }

    proptest! {
        #[test]
        fn prop_sma_is_window_mean(
            closes in prop::collection::vec(1.0f64..1000.0, 1..80),
            period in 1usize..30,
        ) {
            let result = sma(&closes, period);
            prop_assert_eq!(result.len(), closes.len());
            for (i, value) in result.iter().enumerate() {
                if i + 1 < period {
                    prop_assert!(value.is_none());
                } else {
                    let window = &closes[i + 1 - period..=i];
                    let expected = window.iter().sum::<f64>() / period as f64;
                    prop_assert!((value.unwrap() - expected).abs() < 1e-9);
                }
            }
        }

        #[test]
        fn prop_bollinger_bands_ordered(
            closes in prop::collection::vec(1.0f64..1000.0, 20..80),
            k in 0.5f64..3.0,
        ) {
            let bands = bollinger_bands(&closes, 20, k);
            for i in 19..closes.len() {
                let (u, m, l) = (bands.upper[i].unwrap(), bands.middle[i].unwrap(), bands.lower[i].unwrap());
                prop_assert!(u >= m && m >= l);
            }
        }

        #[test]
        fn prop_rsi_bounded(closes in prop::collection::vec(1.0f64..1000.0, 2..80), period in 1usize..20) {
            for value in rsi(&closes, period).into_iter().flatten() {
                prop_assert!((0.0..=100.0).contains(&value));
            }
        }

        #[test]
        fn prop_ema_seed_matches_sma(closes in prop::collection::vec(1.0f64..1000.0, 30..60), period in 1usize..30) {
            let e = ema(&closes, period);
            let s = sma(&closes, period);
            prop_assert!((e[period - 1].unwrap() - s[period - 1].unwrap()).abs() < 1e-9);
            prop_assert!(e[..period - 1].iter().all(Option::is_none));
        }

        #[test]
        fn prop_compute_is_deterministic(closes in prop::collection::vec(1.0f64..1000.0, 1..120)) {
            let series = series_from_closes(&closes);
            let settings = IndicatorSettings::default();
            prop_assert_eq!(compute(&series, &settings), compute(&series, &settings));
        }

        #[test]
        fn prop_zones_meet_touch_minimum(
            closes in prop::collection::vec(50.0f64..150.0, 3..100),
            min_touches in 1usize..4,
        ) {
            let series = series_from_closes(&closes);
            let current = *closes.last().unwrap();
            let sr = support_resistance(&series, 50, min_touches);
            prop_assert!(sr.support.len() <= 3 && sr.resistance.len() <= 3);
            for zone in sr.support.iter().chain(sr.resistance.iter()) {
                prop_assert!(zone.touches >= min_touches);
            }
            for zone in &sr.support {
                prop_assert!(zone.price < current + 0.01);
            }
            for zone in &sr.resistance {
                prop_assert!(zone.price > current - 0.01);
            }
        }
    }
}
