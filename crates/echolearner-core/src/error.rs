//! Error types for the EchoLearner synthesis engine.

use crate::document::{BlockId, SentenceId};

/// Result type alias for EchoLearner operations
pub type EchoResult<T> = Result<T, EchoError>;

/// Main error type for EchoLearner operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EchoError {
    /// Input was empty after trimming; raised before any network call
    #[error("Empty input: {message}")]
    EmptyInput {
        /// Error message describing what was empty
        message: String,
    },

    /// The provider rejected the session credentials
    #[error("Authentication required: {message}")]
    Unauthenticated {
        /// Error message reported by the provider
        message: String,
    },

    /// The synthesis provider returned a non-success response
    #[error("Provider error: {message}")]
    ProviderError {
        /// Error message reported by the provider or transport
        message: String,
    },

    /// Every sentence in the document is blank
    #[error("No audio to merge: every sentence is blank")]
    NoContent,

    /// Merging artifacts failed
    #[error("Merge failed: {message}")]
    MergeFailure {
        /// Error message describing the merge failure
        message: String,
    },

    /// Block not found in the current snapshot
    #[error("Block '{block_id}' not found")]
    BlockNotFound {
        /// The block ID that was not found
        block_id: BlockId,
    },

    /// Sentence not found in the current snapshot
    #[error("Sentence '{sentence_id}' not found")]
    SentenceNotFound {
        /// The sentence ID that was not found
        sentence_id: SentenceId,
    },

    /// A synthesis result arrived after its sentence was edited or regenerated
    #[error("Result for sentence '{sentence_id}' was superseded")]
    Superseded {
        /// The sentence whose result was dropped
        sentence_id: SentenceId,
    },

    /// Audio playback failed
    #[error("Playback error: {message}")]
    PlaybackError {
        /// Error message describing the playback failure
        message: String,
    },

    /// A playback sequence is already running for the block
    #[error("Block '{block_id}' is already playing")]
    PlaybackBusy {
        /// The block that is already playing
        block_id: BlockId,
    },

    /// Artifact payload or wire form is malformed
    #[error("Invalid audio artifact: {message}")]
    InvalidArtifact {
        /// Error message describing the malformed artifact
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Error message describing the configuration issue
        message: String,
    },

    /// File I/O error
    #[error("File I/O error: {message}")]
    FileError {
        /// Error message describing the file operation failure
        message: String,
    },
}

impl EchoError {
    /// Create a new empty input error
    #[must_use]
    pub fn empty_input<S: Into<String>>(message: S) -> Self {
        Self::EmptyInput {
            message: message.into(),
        }
    }

    /// Create a new authentication error
    #[must_use]
    pub fn unauthenticated<S: Into<String>>(message: S) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Create a new provider error
    #[must_use]
    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::ProviderError {
            message: message.into(),
        }
    }

    /// Create a new merge failure
    #[must_use]
    pub fn merge<S: Into<String>>(message: S) -> Self {
        Self::MergeFailure {
            message: message.into(),
        }
    }

    /// Create a new block not found error
    #[must_use]
    pub const fn block_not_found(block_id: BlockId) -> Self {
        Self::BlockNotFound { block_id }
    }

    /// Create a new sentence not found error
    #[must_use]
    pub const fn sentence_not_found(sentence_id: SentenceId) -> Self {
        Self::SentenceNotFound { sentence_id }
    }

    /// Create a new superseded error
    #[must_use]
    pub const fn superseded(sentence_id: SentenceId) -> Self {
        Self::Superseded { sentence_id }
    }

    /// Create a new playback error
    #[must_use]
    pub fn playback<S: Into<String>>(message: S) -> Self {
        Self::PlaybackError {
            message: message.into(),
        }
    }

    /// Create a new invalid artifact error
    #[must_use]
    pub fn invalid_artifact<S: Into<String>>(message: S) -> Self {
        Self::InvalidArtifact {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Check if this error describes the content of one sentence and
    /// should be stored on it as `Failed`
    #[must_use]
    pub const fn is_content_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput { .. } | Self::ProviderError { .. } | Self::InvalidArtifact { .. }
        )
    }

    /// Check if this error is due to invalid user input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput { .. } | Self::NoContent | Self::ConfigurationError { .. }
        )
    }

    /// Check if this error is a lookup miss against the current snapshot
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::BlockNotFound { .. } | Self::SentenceNotFound { .. }
        )
    }

    /// Get the error category for logging
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::EmptyInput { .. } => "input",
            Self::Unauthenticated { .. } => "auth",
            Self::ProviderError { .. } => "provider",
            Self::NoContent => "content",
            Self::MergeFailure { .. } => "merge",
            Self::BlockNotFound { .. } | Self::SentenceNotFound { .. } => "document",
            Self::Superseded { .. } => "superseded",
            Self::PlaybackError { .. } | Self::PlaybackBusy { .. } => "playback",
            Self::InvalidArtifact { .. } => "artifact",
            Self::ConfigurationError { .. } => "configuration",
            Self::FileError { .. } => "file",
        }
    }
}

impl From<std::io::Error> for EchoError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}

impl From<reqwest::Error> for EchoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::provider(format!("request timed out: {err}"))
        } else {
            Self::provider(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EchoError {
    fn from(err: serde_json::Error) -> Self {
        Self::provider(format!("malformed response body: {err}"))
    }
}

impl From<base64::DecodeError> for EchoError {
    fn from(err: base64::DecodeError) -> Self {
        Self::invalid_artifact(format!("payload is not valid base64: {err}"))
    }
}

impl From<toml::de::Error> for EchoError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(err.to_string())
    }
}
