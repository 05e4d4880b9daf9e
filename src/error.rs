use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage io failed for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by workflow operations. Every variant aborts the operation
/// without touching stored state.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("feedback is required before marking a report as resolved")]
    FeedbackRequired,

    #[error("no user is logged in")]
    NotLoggedIn,

    #[error("{role} accounts may not {action}")]
    Forbidden { role: &'static str, action: &'static str },

    #[error("username {0} not found; ask the administrator to register the account")]
    UnknownUser(String),

    #[error("wrong password")]
    WrongPassword,

    #[error("report {0} not found")]
    ReportNotFound(String),

    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("department {0} not found")]
    DepartmentNotFound(String),

    #[error("username {0} is already taken")]
    DuplicateUsername(String),

    #[error("you cannot remove your own account")]
    CannotRemoveSelf,

    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
