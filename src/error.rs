use thiserror::Error;

/// Errors produced while configuring, loading data for, or running a clustering.
///
/// Cancelling a running fit is not an error, see [`crate::FitStatus::Cancelled`].
#[derive(Debug, Error)]
pub enum KMeansError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("invalid initialization parameters: {0}")]
    InitParams(String),
    #[error("invalid sparse vector: {0}")]
    InvalidVector(String),
    #[error("row {row} has {len} columns, expected {expected}")]
    DimensionMismatch { row: usize, len: usize, expected: usize },
    #[error("no cluster centers available, fit the model first")]
    NotFitted,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl KMeansError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        KMeansError::Config(message.into())
    }

    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        KMeansError::Parse { line, message: message.into() }
    }

    pub(crate) fn init_params(message: impl Into<String>) -> Self {
        KMeansError::InitParams(message.into())
    }
}

pub type Result<T> = std::result::Result<T, KMeansError>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_location() {
        let err = KMeansError::parse(17, "index 3 is not greater than 5");
        assert_eq!(err.to_string(), "line 17: index 3 is not greater than 5");
        let err = KMeansError::config("k must be at least 1");
        assert_eq!(err.to_string(), "invalid configuration: k must be at least 1");
        assert!(matches!(KMeansError::NotFitted, KMeansError::NotFitted));
    }

    #[test]
    fn io_errors_convert() {
        fn open() -> Result<std::fs::File> {
            Ok(std::fs::File::open("/nonexistent/definitely/missing.libsvm")?)
        }
        assert!(matches!(open(), Err(KMeansError::Io(_))));
    }
}
