use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Column(s) not found in dataset: {}", columns.join(", "))]
    MissingColumnError { columns: Vec<String> },

    #[error("Column '{column}' is not numeric")]
    NonNumericColumnError { column: String },

    #[error("Insufficient data for {context}: {available} complete cases, need at least {required}")]
    InsufficientDataError {
        context: String,
        available: usize,
        required: usize,
    },

    #[error("Numerical error: {message}")]
    NumericalError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Plot rendering error: {message}")]
    PlotError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Data,
    Computation,
    Output,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnalysisError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::NumericalError {
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::ProcessingError {
            message: message.into(),
        }
    }

    pub fn plot(message: impl ToString) -> Self {
        Self::PlotError {
            message: message.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::CsvError(_)
            | Self::MissingColumnError { .. }
            | Self::NonNumericColumnError { .. }
            | Self::InsufficientDataError { .. } => ErrorCategory::Data,
            Self::NumericalError { .. } | Self::ProcessingError { .. } => {
                ErrorCategory::Computation
            }
            Self::ZipError(_) | Self::SerializationError(_) | Self::PlotError { .. } => {
                ErrorCategory::Output
            }
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 圖檔失敗不影響數值結果
            Self::PlotError { .. } => ErrorSeverity::Low,
            Self::NumericalError { .. } | Self::InsufficientDataError { .. } => {
                ErrorSeverity::Medium
            }
            Self::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ConfigError { .. } | Self::InvalidConfigValueError { .. } => {
                "Check the command line flags or the config file values"
            }
            Self::MissingConfigError { .. } => {
                "Provide the missing value on the command line or in the config file"
            }
            Self::MissingColumnError { .. } => {
                "Check the column names against the CSV header (names are case-sensitive)"
            }
            Self::NonNumericColumnError { .. } => {
                "Recode text columns as numbers before using them as outcomes, ROIs or covariates"
            }
            Self::InsufficientDataError { .. } => {
                "Reduce the number of covariates or check for missing values in the selected columns"
            }
            Self::NumericalError { .. } => {
                "Check for constant or collinear columns in the selected variables"
            }
            Self::CsvError(_) => "Make sure the input file is a valid comma-separated file with a header row",
            Self::IoError(_) => "Check that the paths exist and are writable",
            Self::ZipError(_) => "Re-run without --archive or free disk space",
            Self::SerializationError(_) => "Re-run with --verbose and report the failing step",
            Self::ProcessingError { .. } => "Re-run with --verbose to see which step failed",
            Self::PlotError { .. } => "Tables were written; re-run to regenerate the figures",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::MissingColumnError { columns } => {
                format!("The dataset has no column named {}", columns.join(", "))
            }
            Self::InsufficientDataError {
                context, available, ..
            } => format!(
                "Not enough complete rows for {} (only {} available)",
                context, available
            ),
            other => other.to_string(),
        }
    }

    /// 對應 CLI 的結束代碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message_lists_all_names() {
        let err = AnalysisError::MissingColumnError {
            columns: vec!["lcaud".to_string(), "rcaud".to_string()],
        };
        assert_eq!(err.category(), ErrorCategory::Data);
        assert!(err.to_string().contains("lcaud, rcaud"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_severity_exit_codes() {
        assert_eq!(AnalysisError::plot("x").exit_code(), 0);
        assert_eq!(AnalysisError::numerical("singular").exit_code(), 2);
        let io = AnalysisError::from(std::io::Error::other("disk"));
        assert_eq!(io.exit_code(), 3);
    }
}
