use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// User-facing error buckets. Upstream failures keep their status and
/// message; the category only decides how the UI presents them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    Configuration,
    NotFound,
    Unauthorized,
    RateLimited,
    Validation,
    InvalidInput,
    Precondition,
    Upstream,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Configuration => "Configuration",
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::Unauthorized => "Unauthorized",
            ErrorCategory::RateLimited => "RateLimited",
            ErrorCategory::Validation => "Validation",
            ErrorCategory::InvalidInput => "InvalidInput",
            ErrorCategory::Precondition => "Precondition",
            ErrorCategory::Upstream => "Upstream",
            ErrorCategory::Internal => "Internal",
        }
    }

    /// Classify an upstream failure. The provider's error code wins over
    /// the bare HTTP status.
    pub fn from_upstream(status: u16, code: Option<&str>) -> Self {
        match code {
            Some("object_not_found") => return ErrorCategory::NotFound,
            Some("unauthorized") | Some("restricted_resource") | Some("invalid_api_key") => {
                return ErrorCategory::Unauthorized
            }
            Some("rate_limited") | Some("rate_limit_exceeded") => {
                return ErrorCategory::RateLimited
            }
            Some("validation_error") | Some("invalid_request_error") => {
                return ErrorCategory::Validation
            }
            _ => {}
        }
        match status {
            404 => ErrorCategory::NotFound,
            401 | 403 => ErrorCategory::Unauthorized,
            429 => ErrorCategory::RateLimited,
            400 | 422 => ErrorCategory::Validation,
            _ => ErrorCategory::Upstream,
        }
    }
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{provider} API key not configured")]
    MissingCredential { provider: String },

    #[error("{provider} API {status}: {message}")]
    Upstream {
        provider: String,
        category: ErrorCategory,
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Select a Notion database first.")]
    NoActiveDatabase,

    #[error("No pages selected")]
    NothingSelected,

    #[error("No content could be derived from markdown")]
    EmptyDocument,

    #[error("No pages could be converted to markdown")]
    NothingConverted,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Keychain error: {0}")]
    Keyring(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;

impl DashboardError {
    /// Build an upstream error from a non-success response body. Notion and
    /// OpenAI both answer with JSON carrying `code`/`message` (OpenAI nests
    /// them under `error`); anything else is passed through verbatim.
    pub fn upstream(provider: &str, status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let envelope = parsed
            .as_ref()
            .map(|value| value.get("error").filter(|inner| inner.is_object()).unwrap_or(value));
        let code = envelope
            .and_then(|value| value.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let message = envelope
            .and_then(|value| value.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| body.trim().to_string());

        DashboardError::Upstream {
            provider: provider.to_string(),
            category: ErrorCategory::from_upstream(status, code.as_deref()),
            status,
            code,
            message,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            DashboardError::MissingCredential { .. } => ErrorCategory::Configuration,
            DashboardError::Upstream { category, .. } => *category,
            DashboardError::InvalidInput(_) | DashboardError::EmptyDocument => {
                ErrorCategory::InvalidInput
            }
            DashboardError::NoActiveDatabase | DashboardError::NothingSelected => {
                ErrorCategory::Precondition
            }
            DashboardError::Http(_) | DashboardError::NothingConverted => ErrorCategory::Upstream,
            DashboardError::Json(_)
            | DashboardError::Io(_)
            | DashboardError::Keyring(_)
            | DashboardError::Lock(_)
            | DashboardError::Worker(_) => ErrorCategory::Internal,
        }
    }

    /// HTTP-style status for the IPC payload.
    pub fn status(&self) -> u16 {
        match self {
            DashboardError::Upstream { status, .. } if *status >= 400 => *status,
            _ => match self.category() {
                ErrorCategory::NotFound => 404,
                ErrorCategory::Unauthorized => 401,
                ErrorCategory::RateLimited => 429,
                ErrorCategory::Validation
                | ErrorCategory::InvalidInput
                | ErrorCategory::Precondition => 400,
                ErrorCategory::Upstream => 502,
                ErrorCategory::Configuration | ErrorCategory::Internal => 500,
            },
        }
    }
}

/// Serializable form handed across the IPC boundary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandError {
    pub kind: String,
    pub message: String,
    pub status: u16,
}

impl From<&DashboardError> for CommandError {
    fn from(error: &DashboardError) -> Self {
        Self {
            kind: error.category().as_str().to_string(),
            message: error.to_string(),
            status: error.status(),
        }
    }
}

impl From<DashboardError> for CommandError {
    fn from(error: DashboardError) -> Self {
        CommandError::from(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notion_error_body_maps_code_to_category() {
        let body = r#"{"object":"error","status":404,"code":"object_not_found","message":"Could not find database"}"#;
        let error = DashboardError::upstream("Notion", 404, body);
        assert_eq!(error.category(), ErrorCategory::NotFound);
        assert_eq!(error.status(), 404);
        assert_eq!(error.to_string(), "Notion API 404: Could not find database");
    }

    #[test]
    fn openai_nested_error_is_unwrapped() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#;
        let error = DashboardError::upstream("OpenAI", 429, body);
        assert_eq!(error.category(), ErrorCategory::RateLimited);
        assert!(error.to_string().contains("Rate limit reached"));
    }

    #[test]
    fn code_takes_precedence_over_status() {
        assert_eq!(
            ErrorCategory::from_upstream(400, Some("unauthorized")),
            ErrorCategory::Unauthorized
        );
        assert_eq!(ErrorCategory::from_upstream(503, None), ErrorCategory::Upstream);
    }

    #[test]
    fn plain_text_body_is_passed_through() {
        let error = DashboardError::upstream("Notion", 502, "bad gateway\n");
        match error {
            DashboardError::Upstream { message, code, .. } => {
                assert_eq!(message, "bad gateway");
                assert!(code.is_none());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn local_failures_have_proxy_statuses() {
        let missing = DashboardError::MissingCredential {
            provider: "Notion".to_string(),
        };
        assert_eq!(missing.status(), 500);
        assert_eq!(DashboardError::InvalidInput("x".to_string()).status(), 400);

        let payload = CommandError::from(&DashboardError::NoActiveDatabase);
        assert_eq!(payload.kind, "Precondition");
        assert_eq!(payload.message, "Select a Notion database first.");
    }
}
