use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tokio::task::JoinError;

pub const IMPORT_ERROR_DESCRIPTION: &str =
    "An error occurred when trying to import your data from the list provider.";

/// Why a request to the remote API ultimately failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    RemoteStatus { code: u16, reason: String },
    Transport { kind: TransportKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportKind {
    Timeout,
    Connection,
    Body,
    Request,
}

impl TransportKind {
    pub fn classify(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportKind::Timeout
        } else if e.is_connect() {
            TransportKind::Connection
        } else if e.is_body() || e.is_decode() {
            TransportKind::Body
        } else {
            TransportKind::Request
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Timeout => "TimeoutError",
            TransportKind::Connection => "ConnectionError",
            TransportKind::Body => "BodyReadError",
            TransportKind::Request => "RequestError",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a remote API request, with enough context to diagnose
/// it without re-running the import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportError {
    pub description: String,
    pub url: String,
    pub api_key: String,
    pub cause: FailureCause,
}

impl ImportError {
    pub fn remote_status(url: &str, api_key: &str, code: u16, reason: impl Into<String>) -> Self {
        ImportError {
            description: IMPORT_ERROR_DESCRIPTION.to_string(),
            url: url.to_string(),
            api_key: api_key.to_string(),
            cause: FailureCause::RemoteStatus {
                code,
                reason: reason.into(),
            },
        }
    }

    pub fn transport(url: &str, api_key: &str, kind: TransportKind) -> Self {
        ImportError {
            description: IMPORT_ERROR_DESCRIPTION.to_string(),
            url: url.to_string(),
            api_key: api_key.to_string(),
            cause: FailureCause::Transport { kind },
        }
    }

    pub fn report(&self) -> ErrorReport {
        let (remote_error_code, remote_error_reason, exception_type) = match &self.cause {
            FailureCause::RemoteStatus { code, reason } => (Some(*code), Some(reason.clone()), None),
            FailureCause::Transport { kind } => (None, None, Some(kind.as_str().to_string())),
        };
        ErrorReport {
            err_desc: self.description.clone(),
            remote_error_code,
            url: Some(self.url.clone()),
            api_key: Some(self.api_key.clone()),
            remote_error_reason,
            exception_type,
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            FailureCause::RemoteStatus { code, reason } => write!(
                f,
                "remote API returned HTTP {} ({}) for {}",
                code, reason, self.url
            ),
            FailureCause::Transport { kind } => {
                write!(f, "transport failure ({}) for {}", kind, self.url)
            }
        }
    }
}

/// Serializable payload handed to the notification collaborator. Field order
/// is the order operators expect to read it in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub err_desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListFailure {
    pub list_id: String,
    pub report: ErrorReport,
}

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("HTTP request failed: {0}")]
    Reqwest(String),
    #[error("Import failed: {0}")]
    Import(Box<ImportError>),
    #[error("Filesystem I/O error: {0}")]
    Io(String),
    #[error("JSON serialization error: {0}")]
    SerdeSerialize(String),
    #[error("JSON parsing error: {0}")]
    SerdeParse(String),
    #[error("API response structure invalid: {message} (URL: {url})")]
    ApiResponseInvalid { message: String, url: String },
    #[error("Invalid API key '{key}': {reason}")]
    InvalidApiKey { key: String, reason: String },
    #[error("List {list_id} has no subscribers; statistics are undefined")]
    NoSubscribers { list_id: String },
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Scheduled refresh failed for {} of {total} list(s)", .failures.len())]
    RefreshFailed {
        total: usize,
        failures: Vec<ListFailure>,
    },
    #[error("Invalid argument provided: {0}")]
    Argument(String),
    #[error("Tokio task join error: {0}")]
    JoinError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Semaphore acquisition error: {0}")]
    SemaphoreAcquire(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Reqwest(e.to_string())
    }
}
impl From<ImportError> for AppError {
    fn from(e: ImportError) -> Self {
        AppError::Import(Box::new(e))
    }
}
impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}
impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() || e.is_eof() || e.is_syntax() {
            AppError::SerdeParse(e.to_string())
        } else {
            AppError::SerdeSerialize(e.to_string())
        }
    }
}
impl From<JoinError> for AppError {
    fn from(e: JoinError) -> Self {
        AppError::JoinError(e.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn response_invalid<S: Into<String>>(message: S, url: &str) -> AppError {
        AppError::ApiResponseInvalid {
            message: message.into(),
            url: url.to_string(),
        }
    }

    pub fn invalid_key<S: Into<String>>(key: &str, reason: S) -> AppError {
        AppError::InvalidApiKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Every failure crosses the task boundary as a structured report, never
    /// as a bare message.
    pub fn report(&self) -> ErrorReport {
        match self {
            AppError::Import(e) => e.report(),
            other => ErrorReport {
                err_desc: IMPORT_ERROR_DESCRIPTION.to_string(),
                remote_error_code: None,
                url: match other {
                    AppError::ApiResponseInvalid { url, .. } => Some(url.clone()),
                    _ => None,
                },
                api_key: match other {
                    AppError::InvalidApiKey { key, .. } => Some(key.clone()),
                    _ => None,
                },
                remote_error_reason: None,
                exception_type: Some(format!("{}: {}", other.kind_name(), other)),
            },
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            AppError::Reqwest(_) => "Reqwest",
            AppError::Import(_) => "Import",
            AppError::Io(_) => "Io",
            AppError::SerdeSerialize(_) => "SerdeSerialize",
            AppError::SerdeParse(_) => "SerdeParse",
            AppError::ApiResponseInvalid { .. } => "ApiResponseInvalid",
            AppError::InvalidApiKey { .. } => "InvalidApiKey",
            AppError::NoSubscribers { .. } => "NoSubscribers",
            AppError::Persistence(_) => "Persistence",
            AppError::RefreshFailed { .. } => "RefreshFailed",
            AppError::Argument(_) => "Argument",
            AppError::JoinError(_) => "JoinError",
            AppError::ConfigError(_) => "ConfigError",
            AppError::SemaphoreAcquire(_) => "SemaphoreAcquire",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_failure_report_carries_remote_fields() {
        let err = ImportError::remote_status("https://x/lists/1/members", "abc-us2", 404, "Not Found");
        let report = err.report();
        assert_eq!(report.remote_error_code, Some(404));
        assert_eq!(report.remote_error_reason.as_deref(), Some("Not Found"));
        assert_eq!(report.api_key.as_deref(), Some("abc-us2"));
        assert_eq!(report.exception_type, None);
    }

    #[test]
    fn transport_failure_report_names_exception_type() {
        let err = ImportError::transport("https://x", "abc-us2", TransportKind::Timeout);
        let report = AppError::from(err).report();
        assert_eq!(report.exception_type.as_deref(), Some("TimeoutError"));
        assert_eq!(report.remote_error_code, None);
        assert_eq!(report.url.as_deref(), Some("https://x"));
    }

    #[test]
    fn report_serializes_fields_in_order() {
        let err = ImportError::remote_status("u", "k", 500, "Internal Server Error");
        let json = serde_json::to_string(&err.report()).unwrap();
        let desc = json.find("err_desc").unwrap();
        let code = json.find("remote_error_code").unwrap();
        let reason = json.find("remote_error_reason").unwrap();
        assert!(desc < code && code < reason);
        assert!(!json.contains("exception_type"));
    }

    #[test]
    fn local_errors_still_produce_structured_reports() {
        let report = AppError::invalid_key("abc123", "missing data center suffix").report();
        assert_eq!(report.api_key.as_deref(), Some("abc123"));
        assert!(report
            .exception_type
            .as_deref()
            .unwrap()
            .starts_with("InvalidApiKey"));
    }
}
