use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum SchaltError {
    SessionNotFound {
        session_id: String,
    },
    RemoteCallFailed {
        operation: String,
        message: String,
    },
    GitOperationFailed {
        operation: String,
        message: String,
    },
    InvalidInput {
        field: String,
        message: String,
    },
    InvalidSessionState {
        session_id: String,
        current_state: String,
        expected_state: String,
    },
}

impl SchaltError {
    pub fn remote(operation: &str, error: impl ToString) -> Self {
        SchaltError::RemoteCallFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    pub fn git(operation: &str, error: impl ToString) -> Self {
        SchaltError::GitOperationFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        }
    }

    pub fn invalid_input(field: &str, message: impl ToString) -> Self {
        SchaltError::InvalidInput {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn session_not_found(session_id: &str) -> Self {
        SchaltError::SessionNotFound {
            session_id: session_id.to_string(),
        }
    }
}

impl fmt::Display for SchaltError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SessionNotFound { session_id } => {
                write!(f, "Session '{session_id}' not found")
            }
            Self::RemoteCallFailed { operation, message } => {
                write!(f, "Remote call '{operation}' failed: {message}")
            }
            Self::GitOperationFailed { operation, message } => {
                write!(f, "Git operation '{operation}' failed: {message}")
            }
            Self::InvalidInput { field, message } => {
                write!(f, "Invalid input for field '{field}': {message}")
            }
            Self::InvalidSessionState {
                session_id,
                current_state,
                expected_state,
            } => {
                write!(
                    f,
                    "Session '{session_id}' is in state '{current_state}', expected '{expected_state}'"
                )
            }
        }
    }
}

impl std::error::Error for SchaltError {}

impl From<SchaltError> for String {
    fn from(error: SchaltError) -> Self {
        error.to_string()
    }
}
