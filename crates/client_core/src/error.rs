use std::fmt;

use thiserror::Error;

/// Backend call a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiOperation {
    Upload,
    Analyze,
    Create,
    FetchItem,
    ListItems,
}

impl ApiOperation {
    pub fn label(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Analyze => "image analysis",
            Self::Create => "item creation",
            Self::FetchItem => "item lookup",
            Self::ListItems => "item listing",
        }
    }
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("{operation} failed: {message}")]
    Network {
        operation: ApiOperation,
        message: String,
    },
    #[error("result superseded by a newer file selection")]
    Stale,
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn network(operation: ApiOperation, message: impl Into<String>) -> Self {
        Self::Network {
            operation,
            message: message.into(),
        }
    }

    pub(crate) fn from_transport(operation: ApiOperation, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "backend unreachable; check the server URL and network".to_string()
        } else if err.is_decode() {
            format!("unexpected response body: {err}")
        } else {
            err.to_string()
        };
        Self::network(operation, message)
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    /// Message shown to the reporting user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Network {
                operation: ApiOperation::Upload,
                message,
            } => format!("Failed to upload image: {message}"),
            Self::Network {
                operation: ApiOperation::Analyze,
                message,
            } => format!(
                "Image analysis failed ({message}); fill in the details manually"
            ),
            Self::Network {
                operation: ApiOperation::Create,
                message,
            } => format!("Failed to create lost item: {message}"),
            Self::Network {
                operation: ApiOperation::FetchItem | ApiOperation::ListItems,
                message,
            } => format!("Failed to load reported items: {message}"),
            Self::Stale => self.to_string(),
            Self::Config(message) => format!("Configuration error: {message}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
