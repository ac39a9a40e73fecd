//! JSON envelope shared by all commands.

use serde::Serialize;

use crate::error::Result;

/// Output of one command invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> CommandOutput<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }

    /// Pretty JSON. Serialization failures become a failure envelope.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            let failure = CommandOutput::<()>::failure(format!("failed to serialize output: {}", e));
            serde_json::to_string_pretty(&failure).unwrap_or_default()
        })
    }
}
