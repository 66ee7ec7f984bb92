use thiserror::Error;

/// Which collaborator call timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Resolve,
    Generate,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Resolve => f.write_str("text resolution"),
            Operation::Generate => f.write_str("document generation"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BalloonError {
    /// Collaborator unreachable or the connection failed mid-request
    #[error("Transport error: {0}")]
    Transport(String),

    /// Collaborator answered with a non-success status
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("{operation} timed out after {ms}ms")]
    Timeout { operation: Operation, ms: u64 },

    /// Rejected before any collaborator was called
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Point ({nx:.4}, {ny:.4}) lies outside the page")]
    OutOfBounds { nx: f64, ny: f64 },

    #[error("Failed to parse PDF: {0}")]
    Pdf(String),

    #[error("Invalid raster surface: {0}")]
    Image(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BalloonError {
    /// Transport-class failures: unreachable, non-2xx or timed out
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BalloonError::Transport(_) | BalloonError::Server { .. } | BalloonError::Timeout { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BalloonError::Validation(_) | BalloonError::OutOfBounds { .. }
        )
    }
}

impl From<lopdf::Error> for BalloonError {
    fn from(err: lopdf::Error) -> Self {
        BalloonError::Pdf(err.to_string())
    }
}
