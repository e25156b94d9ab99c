use tracing::info;

use crate::error::Result;
use crate::models::{AnalysisResult, DescriptiveComparison, Group, SampleSizes};
use crate::report;
use crate::stats;

/// Descriptive statistics, effect sizes, Welch's test and the conclusion for one run.
pub fn run_full_analysis(sample_a: &[f64], sample_b: &[f64], alpha: f64) -> Result<AnalysisResult> {
    stats::ensure_sample(Group::A, sample_a)?;
    stats::ensure_sample(Group::B, sample_b)?;

    let group_a = stats::descriptive_stats(sample_a);
    let group_b = stats::descriptive_stats(sample_b);
    let effect = stats::effect(group_a.mean, group_b.mean, group_a.std, group_b.std);
    let ttest = stats::welch_ttest(sample_a, sample_b, alpha)?;

    info!(
        t_statistic = ttest.t_statistic,
        p_value = ttest.p_value,
        df = ttest.degrees_of_freedom,
        significant = ttest.significant,
        "welch t-test complete"
    );

    let mut result = AnalysisResult {
        descriptive_stats: DescriptiveComparison {
            group_a,
            group_b,
            effect,
        },
        ttest,
        sample_sizes: SampleSizes {
            group_a: sample_a.len(),
            group_b: sample_b.len(),
        },
        conclusion: String::new(),
    };
    result.conclusion = report::generate_conclusion(&result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn full_analysis_on_significant_samples() {
        let result = run_full_analysis(
            &[20.0, 22.0, 18.0, 21.0, 19.0],
            &[15.0, 14.0, 16.0, 15.0, 16.0],
            0.05,
        )
        .unwrap();
        assert_eq!(result.sample_sizes.group_a, 5);
        assert_eq!(result.sample_sizes.group_b, 5);
        assert!(result.ttest.significant);
        assert!((result.descriptive_stats.effect.relative_diff + 24.0).abs() < 1e-9);
        assert!(result.conclusion.contains("-24.0%"));
    }

    #[test]
    fn full_analysis_on_identical_samples() {
        let same = [10.0; 5];
        let result = run_full_analysis(&same, &same, 0.05).unwrap();
        assert_eq!(result.ttest.mean_diff, 0.0);
        assert_eq!(result.ttest.p_value, 1.0);
        assert!(!result.ttest.significant);
        assert!(result.conclusion.contains("p-value: 1.0000"));
    }

    #[test]
    fn full_analysis_rejects_single_observation() {
        let err = run_full_analysis(&[1.0, 2.0], &[3.0], 0.05).unwrap_err();
        assert!(matches!(err, AppError::InsufficientSample { size: 1, .. }));
        assert!(err.to_string().contains("group B"));
    }

    #[test]
    fn stricter_alpha_changes_only_the_flag() {
        let a = [12.0, 14.0, 11.0, 13.0];
        let b = [10.0, 12.0, 9.0, 12.0];
        let loose = run_full_analysis(&a, &b, 0.5).unwrap();
        let strict = run_full_analysis(&a, &b, 0.0001).unwrap();
        assert_eq!(loose.ttest.p_value, strict.ttest.p_value);
        assert!(loose.ttest.significant);
        assert!(!strict.ttest.significant);
    }
}
