use reqwest::StatusCode;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("{service} API returned status {status}: {body}")]
    ExternalApi {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("No watched titles found on {0}")]
    EmptyHistory(&'static str),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Report error: {0}")]
    Report(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether retrying the same call may succeed
    ///
    /// Rate limits, server-side failures, timeouts and refused connections are transient.
    /// Authentication and other client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            AppError::ExternalApi { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || status.is_server_error()
            }
            _ => false,
        }
    }

    /// HTTP status of the failing upstream call, if there was one
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AppError::ExternalApi { status, .. } => Some(*status),
            AppError::HttpClient(e) => e.status(),
            _ => None,
        }
    }

    /// Builds an `ExternalApi` error from a non-success response, consuming its body
    pub async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        AppError::ExternalApi {
            service,
            status,
            body,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
