use analysis_core::stats::{mean, percentile_sorted};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use statrs::distribution::{Binomial, DiscreteCDF};

use crate::models::ConfidenceInterval;

/// Fewest returns worth resampling.
const MIN_BOOTSTRAP_RETURNS: usize = 5;

/// Two-sided p-value for `successes` out of `trials` under a 50% success null.
///
/// The null is symmetric, so the two-sided value is twice the smaller tail, capped at 1.
pub fn binomial_p_value(successes: usize, trials: usize) -> f64 {
    if trials == 0 || successes > trials {
        return 1.0;
    }
    let Ok(dist) = Binomial::new(0.5, trials as u64) else {
        return 1.0;
    };
    let tail = successes.min(trials - successes) as u64;
    (2.0 * dist.cdf(tail)).min(1.0)
}

/// Bootstrap 95% confidence interval on the mean of `returns`.
///
/// Resample `i` draws from its own generator seeded with `seed + i`, so the
/// interval is reproducible however rayon schedules the work.
pub fn bootstrap_mean_ci(returns: &[f64], num_samples: usize, seed: u64) -> Option<ConfidenceInterval> {
    if returns.len() < MIN_BOOTSTRAP_RETURNS || num_samples == 0 {
        return None;
    }

    let n = returns.len();
    let mut means: Vec<f64> = (0..num_samples)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let resampled: Vec<f64> = (0..n).map(|_| returns[rng.gen_range(0..n)]).collect();
            mean(&resampled)
        })
        .collect();

    means.sort_by(|a, b| a.total_cmp(b));
    Some(ConfidenceInterval {
        lower: percentile_sorted(&means, 2.5),
        upper: percentile_sorted(&means, 97.5),
        samples: num_samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binomial_all_successes_is_significant() {
        let p = binomial_p_value(10, 10);
        assert!((p - 2.0 / 1024.0).abs() < 1e-9);
    }

    #[test]
    fn test_binomial_even_split_is_not_significant() {
        assert_eq!(binomial_p_value(5, 10), 1.0);
        assert_eq!(binomial_p_value(0, 0), 1.0);
    }

    #[test]
    fn test_binomial_symmetric() {
        assert!((binomial_p_value(2, 12) - binomial_p_value(10, 12)).abs() < 1e-12);
    }

    #[test]
    fn test_bootstrap_is_seeded() {
        let returns = [1.0, -0.5, 2.0, 0.3, -1.2, 0.8, 1.5, -0.1];
        let a = bootstrap_mean_ci(&returns, 200, 7).unwrap();
        let b = bootstrap_mean_ci(&returns, 200, 7).unwrap();
        assert_eq!(a, b);
        assert!(a.lower <= mean(&returns) && mean(&returns) <= a.upper);
    }

    #[test]
    fn test_bootstrap_needs_enough_returns() {
        assert!(bootstrap_mean_ci(&[1.0, 2.0], 100, 1).is_none());
        assert!(bootstrap_mean_ci(&[1.0; 10], 0, 1).is_none());
    }
}
