//! Error types for Conceptmap

use thiserror::Error;

/// Result type alias using Conceptmap's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of errors, used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, id collision, dangling link endpoint
    Validation,
    /// An id absent from the graph store or the folder hierarchy
    NotFound,
    /// An external collaborator failed or returned something unusable
    ExternalService,
    /// A superseded asynchronous response (never shown to the user)
    StaleResponse,
    /// Persistence backend failure
    Storage,
    /// Configuration problem
    Config,
    /// Anything else
    Other,
}

/// Conceptmap error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Graph errors (E001-E099)
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Node '{0}' not found. Run `conceptmap nodes` to see all concepts.")]
    NodeNotFound(String),

    #[error("Folder '{0}' not found in the concept tree.")]
    FolderNotFound(String),

    #[error("Duplicate concept '{0}' already exists in the graph.")]
    DuplicateConcept(String),

    // External service errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Rate limited. Retry after {0} seconds.")]
    RateLimited(u64),

    #[error("{service} service failed: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },

    #[error("{0} service is not configured")]
    ServiceUnavailable(&'static str),

    // Request ordering errors (E200-E299)
    #[error("Stale {slot} response (token {token}, latest {latest}) discarded")]
    StaleResponse {
        slot: &'static str,
        token: u64,
        latest: u64,
    },

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for an external service failure
    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service,
            message: message.into(),
        }
    }

    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed(_) => "E001",
            Self::NodeNotFound(_) => "E002",
            Self::FolderNotFound(_) => "E003",
            Self::DuplicateConcept(_) => "E004",
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::ExternalService { .. } => "E103",
            Self::ServiceUnavailable(_) => "E104",
            Self::StaleResponse { .. } => "E200",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Map this error onto the coarse taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationFailed(_) | Self::DuplicateConcept(_) => ErrorKind::Validation,
            Self::NodeNotFound(_) | Self::FolderNotFound(_) => ErrorKind::NotFound,
            Self::NetworkError(_)
            | Self::LLMError(_)
            | Self::RateLimited(_)
            | Self::ExternalService { .. }
            | Self::ServiceUnavailable(_) => ErrorKind::ExternalService,
            Self::StaleResponse { .. } => ErrorKind::StaleResponse,
            Self::DatabaseError(_) => ErrorKind::Storage,
            Self::ConfigError(_) => ErrorKind::Config,
            Self::Other(_) | Self::Io(_) => ErrorKind::Other,
        }
    }

    /// Whether the user can reasonably retry the same operation
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::ExternalService
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NodeNotFound(_) => Some("conceptmap nodes".to_string()),
            Self::FolderNotFound(_) => Some("conceptmap tree --expand-all".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LLMError(_) | Self::ServiceUnavailable(_) => {
                Some("Set CONCEPTMAP_API_KEY or OPENROUTER_API_KEY".to_string())
            }
            Self::RateLimited(secs) => Some(format!("Wait {} seconds and try again", secs)),
            Self::DuplicateConcept(_) => Some("conceptmap config set merge.dedup allow".to_string()),
            _ => None,
        }
    }
}
