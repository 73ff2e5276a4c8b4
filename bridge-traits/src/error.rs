use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure is worth retrying at the transport level.
    pub fn is_transient(&self) -> bool {
        match self {
            BridgeError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            BridgeError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Whether the failure means the target path does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_are_not_found() {
        let err = BridgeError::from(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert!(!BridgeError::OperationFailed("x".into()).is_not_found());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = BridgeError::HttpStatus {
            status: 503,
            url: "https://feeds.example.com/rss".to_string(),
        };
        assert!(err.is_transient());

        let err = BridgeError::HttpStatus {
            status: 404,
            url: "https://feeds.example.com/rss".to_string(),
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn io_timeouts_are_transient() {
        let err = BridgeError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(err.is_transient());
        assert!(!BridgeError::OperationFailed("nope".into()).is_transient());
    }
}
