use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Group {
    A,
    B,
}

impl Group {
    pub fn label(self) -> &'static str {
        match self {
            Group::A => "A",
            Group::B => "B",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TicketRecord {
    pub line: usize,
    pub group: Option<Group>,
    pub unit: Option<String>,
    pub ticket_id: Option<String>,
    pub category: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub resolution_hours: Option<f64>,
    pub is_critical: bool,
    pub is_resolved: bool,
}

#[derive(Debug, Clone)]
pub struct ClassroomAggregate {
    pub unit: String,
    pub group: Group,
    pub ticket_count: usize,
    pub avg_resolution_time: Option<f64>,
    pub critical_tickets: usize,
    pub resolution_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryShift {
    pub category: String,
    pub count_a: usize,
    pub count_b: usize,
    pub change: i64,
    /// `None` when the category never occurs in group A.
    pub change_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count_a: f64,
    pub count_b: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseWarning {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveStats {
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub mean: f64,
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub std: f64,
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub sem: f64,
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub median: f64,
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub min: f64,
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub max: f64,
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub q1: f64,
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub q3: f64,
    pub size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Effect {
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub absolute_diff: f64,
    /// Not finite when the group A mean is zero.
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub relative_diff: f64,
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub cohens_d: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TTestResult {
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub t_statistic: f64,
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub p_value: f64,
    pub significant: bool,
    #[serde(deserialize_with = "de::f64_pair_or_nan")]
    pub confidence_interval: (f64, f64),
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub mean_diff: f64,
    /// Welch–Satterthwaite degrees of freedom used for the p-value.
    #[serde(deserialize_with = "de::f64_or_nan")]
    pub degrees_of_freedom: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveComparison {
    pub group_a: DescriptiveStats,
    pub group_b: DescriptiveStats,
    pub effect: Effect,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleSizes {
    pub group_a: usize,
    pub group_b: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub descriptive_stats: DescriptiveComparison,
    pub ttest: TTestResult,
    pub sample_sizes: SampleSizes,
    pub conclusion: String,
}

/// Deserializers for reading back a result document, where non-finite
/// numbers were written as `null`.
pub mod de {
    use serde::{Deserialize, Deserializer};

    /// `null` → NaN, number → number
    pub fn f64_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }

    /// `[lo, hi]` with either bound possibly `null`
    pub fn f64_pair_or_nan<'de, D>(deserializer: D) -> Result<(f64, f64), D::Error>
    where
        D: Deserializer<'de>,
    {
        let (lo, hi) = <(Option<f64>, Option<f64>)>::deserialize(deserializer)?;
        Ok((lo.unwrap_or(f64::NAN), hi.unwrap_or(f64::NAN)))
    }
}
