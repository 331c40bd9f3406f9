// ABOUTME: Error taxonomy for the connector
// ABOUTME: Separates user-fixable failures from internal ones and maps them to exit codes

use thiserror::Error;

/// Exit status for problems the operator can fix (configuration, credentials, input).
pub const EXIT_USER_ERROR: i32 = 1;
/// Exit status for everything else.
pub const EXIT_INTERNAL_ERROR: i32 = 2;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Delivery of dashboard {dashboard_id} failed{}: {body}", status_suffix(.status))]
    Delivery {
        dashboard_id: i64,
        status: Option<u16>,
        body: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {}", code),
        None => String::new(),
    }
}

impl ConnectorError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ConnectorError::Configuration(_)
            | ConnectorError::Authentication(_)
            | ConnectorError::Validation(_) => EXIT_USER_ERROR,
            ConnectorError::Delivery { .. } | ConnectorError::Storage(_) => EXIT_INTERNAL_ERROR,
        }
    }

    /// True for errors the run records per row instead of aborting on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ConnectorError::Delivery { .. })
    }
}

/// Picks the process exit status for a fatal error.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ConnectorError>()
        .map(ConnectorError::exit_code)
        .unwrap_or(EXIT_INTERNAL_ERROR)
}
