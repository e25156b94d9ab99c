use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_tickets_path")]
    pub tickets: PathBuf,
    #[serde(default = "default_daily_path")]
    pub daily: PathBuf,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupsConfig {
    #[serde(default = "default_label_a")]
    pub a_label: String,
    #[serde(default = "default_label_b")]
    pub b_label: String,
    #[serde(default = "default_name_a")]
    pub a_name: String,
    #[serde(default = "default_name_b")]
    pub b_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorsConfig {
    #[serde(default = "default_color_a")]
    pub a: String,
    #[serde(default = "default_color_b")]
    pub b: String,
}

// Roles left unset fall back to header substring matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuesConfig {
    #[serde(default = "default_critical_priorities")]
    pub critical_priorities: Vec<String>,
    #[serde(default = "default_resolved_statuses")]
    pub resolved_statuses: Vec<String>,
    #[serde(default = "default_created_format")]
    pub created_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyConfig {
    #[serde(default = "default_daily_date_column")]
    pub date_column: String,
    #[serde(default = "default_label_a")]
    pub a_column: String,
    #[serde(default = "default_label_b")]
    pub b_column: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub groups: GroupsConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub colors: ColorsConfig,
    #[serde(default)]
    pub columns: ColumnsConfig,
    #[serde(default)]
    pub values: ValuesConfig,
    #[serde(default)]
    pub daily: DailyConfig,
}

// Default functions
fn default_tickets_path() -> PathBuf {
    PathBuf::from("data/jira_simple_export.csv")
}
fn default_daily_path() -> PathBuf {
    PathBuf::from("data/jira_daily_stats.csv")
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("reports")
}
fn default_label_a() -> String {
    "A".into()
}
fn default_label_b() -> String {
    "B".into()
}
fn default_name_a() -> String {
    "Control (old instructions)".into()
}
fn default_name_b() -> String {
    "Treatment (new instructions)".into()
}
fn default_alpha() -> f64 {
    0.05
}
fn default_trend_window() -> usize {
    7
}
fn default_color_a() -> String {
    "#FF6B6B".into()
}
fn default_color_b() -> String {
    "#4ECDC4".into()
}
fn default_critical_priorities() -> Vec<String> {
    vec!["Highest".into()]
}
fn default_resolved_statuses() -> Vec<String> {
    vec![
        "Решена".into(),
        "Закрыта".into(),
        "Resolved".into(),
        "Closed".into(),
    ]
}
fn default_created_format() -> String {
    "%d/%m/%Y %H:%M".into()
}
fn default_daily_date_column() -> String {
    "Дата".into()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tickets: default_tickets_path(),
            daily: default_daily_path(),
            reports_dir: default_reports_dir(),
        }
    }
}

impl Default for GroupsConfig {
    fn default() -> Self {
        Self {
            a_label: default_label_a(),
            b_label: default_label_b(),
            a_name: default_name_a(),
            b_name: default_name_b(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            trend_window: default_trend_window(),
        }
    }
}

impl Default for ColorsConfig {
    fn default() -> Self {
        Self {
            a: default_color_a(),
            b: default_color_b(),
        }
    }
}

impl Default for ValuesConfig {
    fn default() -> Self {
        Self {
            critical_priorities: default_critical_priorities(),
            resolved_statuses: default_resolved_statuses(),
            created_format: default_created_format(),
        }
    }
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            date_column: default_daily_date_column(),
            a_column: default_label_a(),
            b_column: default_label_b(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                let config = Self::from_toml(&content)?;
                debug!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.paths.reports_dir.join("figures")
    }
}
