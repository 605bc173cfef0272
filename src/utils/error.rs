use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Table '{table}' has no '{column}' column (found: {found})")]
    MissingColumnError {
        table: String,
        column: String,
        found: String,
    },

    #[error("Invalid selection: {message}")]
    SelectionError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Configuration,
    InputSchema,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 根據錯誤嚴重程度決定退出碼
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,      // 警告，但成功
            ErrorSeverity::Medium => 2,   // 重試錯誤
            ErrorSeverity::High => 1,     // 處理錯誤
            ErrorSeverity::Critical => 3, // 系統錯誤
        }
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) => ErrorCategory::Network,
            EtlError::ZipError(_) | EtlError::IoError(_) => ErrorCategory::Storage,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::SelectionError { .. } => ErrorCategory::Configuration,
            EtlError::MissingColumnError { .. } | EtlError::CsvError(_) => {
                ErrorCategory::InputSchema
            }
            EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::InputSchema => ErrorSeverity::High,
            ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::ApiError(_) => {
                "Check that the table URL is reachable and returns a CSV body".to_string()
            }
            EtlError::IoError(_) => {
                "Check that the input files exist and the output directory is writable".to_string()
            }
            EtlError::ZipError(_) => "Check that the output bundle is a valid zip file".to_string(),
            EtlError::CsvError(_) => {
                "Check the CSV delimiter and encoding, or pass --delimiter explicitly".to_string()
            }
            EtlError::MissingColumnError { table, column, .. } => format!(
                "Add a '{}' column to the {} table or rename the existing header",
                column, table
            ),
            EtlError::InvalidConfigValueError { field, .. }
            | EtlError::ConfigValidationError { field, .. }
            | EtlError::MissingConfigError { field } => {
                format!("Review the '{}' setting", field)
            }
            EtlError::SelectionError { .. } => {
                "Use 'all' or indices such as \"0,1,3-5\"".to_string()
            }
            EtlError::ConfigError { .. } => "Review the configuration file".to_string(),
            EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. } => {
                "Re-run with --verbose and inspect the offending rows".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::MissingColumnError { table, column, .. } => {
                format!("The {} table is missing the '{}' column", table, column)
            }
            EtlError::ApiError(e) => format!("Could not download an input table: {}", e),
            EtlError::IoError(e) => format!("File access failed: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_high_severity_schema_error() {
        let err = EtlError::MissingColumnError {
            table: "shipments".to_string(),
            column: "address".to_string(),
            found: "Exp, Kgs".to_string(),
        };

        assert_eq!(err.category(), ErrorCategory::InputSchema);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.to_string().contains("address"));
        assert!(err.recovery_suggestion().contains("shipments"));
    }

    #[test]
    fn test_io_error_is_critical() {
        let err = EtlError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().contains("gone"));
        assert_eq!(err.severity().exit_code(), 3);
    }

    #[test]
    fn test_selection_error_is_configuration() {
        let err = EtlError::SelectionError {
            message: "indices out of range: [7]".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity().exit_code(), 1);
    }
}
