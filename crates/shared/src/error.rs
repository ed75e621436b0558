use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::LifecyclePhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Configuration,
    Resolution,
    UnknownPage,
    ModelPath,
    ViewLoad,
    Construction,
    Hook,
    Action,
    Busy,
    Internal,
}

/// Serializable form of a failure, carried on runtime events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl ShellFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("controller could not be found: {controller}")]
    Resolution { controller: String },
    #[error("no page definition found for: {name}")]
    UnknownPage { name: String },
    #[error("model path '{path}' is missing or null at segment '{segment}'")]
    ModelPath { path: String, segment: String },
    #[error("failed to load view '{view}': {source}")]
    ViewLoad {
        view: String,
        source: anyhow::Error,
    },
    #[error("failed to construct controller for page '{page}': {source}")]
    Construction {
        page: String,
        source: anyhow::Error,
    },
    #[error("{phase} failed on page '{page}': {source}")]
    Hook {
        page: String,
        phase: LifecyclePhase,
        source: anyhow::Error,
    },
    #[error("action '{action}' failed on page '{page}': {source}")]
    Action {
        page: String,
        action: String,
        source: anyhow::Error,
    },
    #[error("navigation to '{target}' started while another transition was still in flight")]
    NavigationInFlight { target: String },
}

impl ShellError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::Resolution { .. } => ErrorCode::Resolution,
            Self::UnknownPage { .. } => ErrorCode::UnknownPage,
            Self::ModelPath { .. } => ErrorCode::ModelPath,
            Self::ViewLoad { .. } => ErrorCode::ViewLoad,
            Self::Construction { .. } => ErrorCode::Construction,
            Self::Hook { .. } => ErrorCode::Hook,
            Self::Action { .. } => ErrorCode::Action,
            Self::NavigationInFlight { .. } => ErrorCode::Busy,
        }
    }
}

impl From<&ShellError> for ShellFailure {
    fn from(value: &ShellError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<ShellError> for ShellFailure {
    fn from(value: ShellError) -> Self {
        Self::from(&value)
    }
}
