use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input file not found: {}", .0.display())]
    MissingInput(std::path::PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("cannot render config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("required columns not found: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("configured {role} column {column:?} is not present in the header")]
    ConfiguredColumnMissing { role: String, column: String },

    #[error("file is empty or has no data rows")]
    EmptyFile,

    #[error("group {0} has no classrooms after aggregation")]
    EmptyGroup(String),

    #[error("group {group} has {size} observation(s); at least 2 are required")]
    InsufficientSample { group: String, size: usize },

    #[error("invalid t distribution: {0}")]
    Distribution(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
