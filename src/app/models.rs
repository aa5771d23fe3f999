use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::app::error::AppError;

pub const ERROR_SUBJECT: &str = "/error";
pub const ERROR_INFO_PARAMETER: &str = "info";

/// A request or response exchanged with the driver: a slash-delimited subject plus string
/// parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl Message {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            parameters: HashMap::new(),
        }
    }

    pub fn error(info: impl Into<String>) -> Self {
        Self::new(ERROR_SUBJECT).with_parameter(ERROR_INFO_PARAMETER, info)
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Returns the parameter value, or a validation error when it is absent or blank.
    pub fn require(&self, key: &str, trace_id: &str) -> Result<&str, AppError> {
        match self.parameter(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(AppError::validation(format!("{key} is required"), trace_id)),
        }
    }

    pub fn is_error(&self) -> bool {
        self.subject == ERROR_SUBJECT
    }

    pub fn error_info(&self) -> Option<&str> {
        if self.is_error() {
            self.parameter(ERROR_INFO_PARAMETER)
        } else {
            None
        }
    }
}

impl From<AppError> for Message {
    fn from(err: AppError) -> Self {
        Message::error(err.error)
    }
}

/// One row of `adb devices -l`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceSummary {
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
}

impl DeviceSummary {
    pub fn is_online(&self) -> bool {
        self.state == "device"
    }
}
