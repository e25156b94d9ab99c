use statrs::distribution::{ContinuousCDF, StudentsT};

use crate::error::{AppError, Result};
use crate::models::{DescriptiveStats, Effect, Group, TTestResult};

/// Two-sided 95% interval.
const CI_QUANTILE: f64 = 0.975;

pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with Bessel's correction.
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() as f64 - 1.0)
}

/// Percentile with linear interpolation between order statistics. `p` is in [0, 100].
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

pub fn ensure_sample(group: Group, sample: &[f64]) -> Result<()> {
    if sample.len() < 2 {
        return Err(AppError::InsufficientSample {
            group: group.label().to_string(),
            size: sample.len(),
        });
    }
    Ok(())
}

pub fn descriptive_stats(sample: &[f64]) -> DescriptiveStats {
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let std = variance(sample).sqrt();
    DescriptiveStats {
        mean: mean(sample),
        std,
        sem: std / (sample.len() as f64).sqrt(),
        median: percentile(&sorted, 50.0),
        min: sorted.first().copied().unwrap_or(f64::NAN),
        max: sorted.last().copied().unwrap_or(f64::NAN),
        q1: percentile(&sorted, 25.0),
        q3: percentile(&sorted, 75.0),
        size: sample.len(),
    }
}

pub fn effect(mean_a: f64, mean_b: f64, std_a: f64, std_b: f64) -> Effect {
    let absolute_diff = mean_b - mean_a;
    Effect {
        absolute_diff,
        relative_diff: absolute_diff / mean_a * 100.0,
        cohens_d: absolute_diff / ((std_a.powi(2) + std_b.powi(2)) / 2.0).sqrt(),
    }
}

/// Welch's two-sample t-test of B against A.
///
/// The p-value uses Welch–Satterthwaite degrees of freedom. The confidence
/// interval uses `n_a + n_b - 2` degrees of freedom with the same unpooled
/// standard error; downstream reports are pinned to that construction.
pub fn welch_ttest(sample_a: &[f64], sample_b: &[f64], alpha: f64) -> Result<TTestResult> {
    let n_a = sample_a.len() as f64;
    let n_b = sample_b.len() as f64;
    let se_a = variance(sample_a) / n_a;
    let se_b = variance(sample_b) / n_b;
    let standard_error = (se_a + se_b).sqrt();

    let mean_diff = mean(sample_b) - mean(sample_a);
    let welch_df = (se_a + se_b).powi(2) / (se_a.powi(2) / (n_a - 1.0) + se_b.powi(2) / (n_b - 1.0));

    let (t_statistic, p_value) = if standard_error == 0.0 {
        // Both groups constant: the difference is either exactly zero or certain.
        if mean_diff == 0.0 {
            (0.0, 1.0)
        } else {
            (f64::INFINITY.copysign(mean_diff), 0.0)
        }
    } else {
        let t = mean_diff / standard_error;
        let dist = students_t(welch_df)?;
        (t, (2.0 * dist.cdf(-t.abs())).min(1.0))
    };

    let margin = students_t(n_a + n_b - 2.0)?.inverse_cdf(CI_QUANTILE) * standard_error;

    Ok(TTestResult {
        t_statistic,
        p_value,
        significant: p_value < alpha,
        confidence_interval: (mean_diff - margin, mean_diff + margin),
        mean_diff,
        degrees_of_freedom: welch_df,
    })
}

fn students_t(df: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, df).map_err(|e| AppError::Distribution(format!("df = {df}: {e}")))
}

/// Centered rolling mean; windows are truncated at the edges.
pub fn rolling_mean_centered(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 {
        return values.to_vec();
    }
    let before = window / 2;
    let after = window - 1 - before;
    (0..values.len())
        .map(|i| {
            let start = i.saturating_sub(before);
            let end = (i + after + 1).min(values.len());
            mean(&values[start..end])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TREATED_A: [f64; 5] = [20.0, 22.0, 18.0, 21.0, 19.0];
    const TREATED_B: [f64; 5] = [15.0, 14.0, 16.0, 15.0, 16.0];

    fn close(actual: f64, expected: f64, tol: f64) -> bool {
        (actual - expected).abs() < tol
    }

    #[test]
    fn descriptive_stats_on_known_sample() {
        let stats = descriptive_stats(&TREATED_A);
        assert!(close(stats.mean, 20.0, 1e-12));
        assert!(close(stats.std, 2.5f64.sqrt(), 1e-12));
        assert!(close(stats.sem, 2.5f64.sqrt() / 5f64.sqrt(), 1e-12));
        assert_eq!(stats.median, 20.0);
        assert_eq!(stats.min, 18.0);
        assert_eq!(stats.max, 22.0);
        assert_eq!(stats.q1, 19.0);
        assert_eq!(stats.q3, 21.0);
        assert_eq!(stats.size, 5);
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile(&sorted, 50.0), 2.5, 1e-12));
        assert!(close(percentile(&sorted, 25.0), 1.75, 1e-12));
        assert!(close(percentile(&sorted, 75.0), 3.25, 1e-12));
        assert!(percentile(&[], 50.0).is_nan());
    }

    #[test]
    fn effect_block_for_known_samples() {
        let a = descriptive_stats(&TREATED_A);
        let b = descriptive_stats(&TREATED_B);
        let effect = effect(a.mean, b.mean, a.std, b.std);
        assert!(close(effect.absolute_diff, -4.8, 1e-12));
        assert!(close(effect.relative_diff, -24.0, 1e-9));
        assert!(close(effect.cohens_d, -4.8 / 1.6f64.sqrt(), 1e-12));
    }

    #[test]
    fn relative_diff_is_not_finite_for_zero_baseline() {
        let effect = effect(0.0, 3.0, 1.0, 1.0);
        assert!(!effect.relative_diff.is_finite());
    }

    #[test]
    fn welch_ttest_on_known_samples() {
        let result = welch_ttest(&TREATED_A, &TREATED_B, 0.05).unwrap();
        assert!(close(result.t_statistic, -6.0, 1e-9));
        assert!(close(result.mean_diff, -4.8, 1e-12));
        assert!(close(result.degrees_of_freedom, 0.4096 / 0.0674, 1e-9));
        assert!(close(result.p_value, 0.000_920_41, 1e-6), "p = {}", result.p_value);
        assert!(result.significant);

        let margin = 2.306_004_135 * 0.8;
        assert!(close(result.confidence_interval.0, -4.8 - margin, 1e-5));
        assert!(close(result.confidence_interval.1, -4.8 + margin, 1e-5));
    }

    #[test]
    fn welch_ttest_on_identical_constant_samples() {
        let same = [10.0; 5];
        let result = welch_ttest(&same, &same, 0.05).unwrap();
        assert_eq!(result.mean_diff, 0.0);
        assert_eq!(result.t_statistic, 0.0);
        assert_eq!(result.p_value, 1.0);
        assert!(!result.significant);
        assert_eq!(result.confidence_interval, (0.0, 0.0));
    }

    #[test]
    fn welch_ttest_on_distinct_constant_samples() {
        let result = welch_ttest(&[3.0, 3.0], &[5.0, 5.0, 5.0], 0.05).unwrap();
        assert_eq!(result.t_statistic, f64::INFINITY);
        assert_eq!(result.p_value, 0.0);
        assert!(result.significant);
    }

    #[test]
    fn welch_ttest_equal_means_is_not_significant() {
        let result = welch_ttest(&[1.0, 2.0, 3.0], &[0.0, 2.0, 4.0], 0.05).unwrap();
        assert_eq!(result.t_statistic, 0.0);
        assert!(close(result.p_value, 1.0, 1e-12));
        assert!(!result.significant);
    }

    #[test]
    fn welch_ttest_large_sample_quantile_approaches_normal() {
        let a: Vec<f64> = (0..400).map(|i| (i % 7) as f64).collect();
        let b: Vec<f64> = (0..400).map(|i| (i % 5) as f64 + 1.0).collect();
        let result = welch_ttest(&a, &b, 0.05).unwrap();
        let se = (variance(&a) / 400.0 + variance(&b) / 400.0).sqrt();
        let half_width = (result.confidence_interval.1 - result.confidence_interval.0) / 2.0;
        // t(798) 0.975 quantile
        assert!(close(half_width / se, 1.962_94, 1e-4));
    }

    #[test]
    fn ensure_sample_rejects_short_samples() {
        assert!(ensure_sample(Group::A, &[1.0, 2.0]).is_ok());
        match ensure_sample(Group::B, &[1.0]) {
            Err(AppError::InsufficientSample { group, size }) => {
                assert_eq!(group, "B");
                assert_eq!(size, 1);
            }
            other => panic!("expected InsufficientSample, got {other:?}"),
        }
    }

    #[test]
    fn rolling_mean_truncates_at_edges() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let smooth = rolling_mean_centered(&values, 3);
        assert_eq!(smooth, vec![1.5, 2.0, 3.0, 4.0, 4.5]);
        assert_eq!(rolling_mean_centered(&values, 0), values.to_vec());
    }

    fn sample_strategy() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec(0.0f64..500.0, 2..40)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_descriptive_stats_are_ordered(sample in sample_strategy()) {
            let stats = descriptive_stats(&sample);
            prop_assert!(stats.std >= 0.0);
            prop_assert!(stats.min <= stats.q1);
            prop_assert!(stats.q1 <= stats.median);
            prop_assert!(stats.median <= stats.q3);
            prop_assert!(stats.q3 <= stats.max);
            prop_assert_eq!(stats.size, sample.len());
        }

        #[test]
        fn prop_cohens_d_follows_difference_sign(a in sample_strategy(), b in sample_strategy()) {
            let sa = descriptive_stats(&a);
            let sb = descriptive_stats(&b);
            prop_assume!(sa.std > 0.0 && sb.std > 0.0);
            let e = effect(sa.mean, sb.mean, sa.std, sb.std);
            prop_assert_eq!(e.cohens_d.signum(), e.absolute_diff.signum());
        }

        #[test]
        fn prop_ttest_p_value_and_interval(
            a in sample_strategy(),
            b in sample_strategy(),
            alpha in 0.001f64..0.2,
        ) {
            let result = welch_ttest(&a, &b, alpha).unwrap();
            prop_assert!((0.0..=1.0).contains(&result.p_value));
            prop_assert_eq!(result.significant, result.p_value < alpha);
            let (lo, hi) = result.confidence_interval;
            let below = result.mean_diff - lo;
            let above = hi - result.mean_diff;
            prop_assert!((below - above).abs() <= 1e-9 * (1.0 + below.abs()));
        }
    }
}
