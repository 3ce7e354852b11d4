use std::fmt;

/// Machine-readable error codes surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidFilter,
    ItemNotFound,
    MutationRejected,
    NetworkUnavailable,
    MalformedLocalState,
    StorageWriteFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidFilter => "E1002",
            Self::ItemNotFound => "E2001",
            Self::MutationRejected => "E2002",
            Self::NetworkUnavailable => "E3001",
            Self::MalformedLocalState => "E4001",
            Self::StorageWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidFilter => "Invalid item filter",
            Self::ItemNotFound => "Item not found",
            Self::MutationRejected => "Server rejected the change",
            Self::NetworkUnavailable => "Item service unreachable",
            Self::MalformedLocalState => "Corrupt local state",
            Self::StorageWriteFailed => "Local state write failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to users.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .lostfound/config.toml and retry."),
            Self::InvalidFilter => {
                Some("Use `all` or one of the documented category/status values.")
            }
            Self::ItemNotFound => Some("Refresh the list; the item may have been removed."),
            Self::MutationRejected => None,
            Self::NetworkUnavailable => {
                Some("Check your connection and retry once the service is reachable.")
            }
            Self::MalformedLocalState => Some("The corrupt slot was reset to empty."),
            Self::StorageWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other `lf` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Typed outcome of a failed sync-layer operation.
///
/// `NetworkUnavailable` is absorbed on reads and on create/claim; it only
/// reaches callers from update/delete. `Rejected` and `NotFound` are always
/// surfaced.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("item service unreachable: {reason}")]
    NetworkUnavailable { reason: String },

    #[error("rejected by server: {message}")]
    Rejected { message: String },

    #[error("item not found: {id}")]
    NotFound { id: String },

    #[error("corrupt local slot '{slot}': {detail}")]
    MalformedLocalState { slot: String, detail: String },

    #[error("invalid {field} filter: '{value}'")]
    InvalidFilter { field: &'static str, value: String },

    #[error(transparent)]
    Storage(#[from] crate::store::StoreError),
}

impl SyncError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NetworkUnavailable { .. } => ErrorCode::NetworkUnavailable,
            Self::Rejected { .. } => ErrorCode::MutationRejected,
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::MalformedLocalState { .. } => ErrorCode::MalformedLocalState,
            Self::InvalidFilter { .. } => ErrorCode::InvalidFilter,
            Self::Storage(err) => err.code(),
        }
    }

    /// Optional remediation hint for the presentation layer.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
