use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication rejected by {service}: HTTP {status}")]
    Auth { service: &'static str, status: u16 },

    #[error("Rate limited by {0}")]
    RateLimited(&'static str),

    #[error("{service} returned HTTP {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{0} request timed out")]
    Timeout(&'static str),

    #[error("Network error talking to {service}: {message}")]
    Network {
        service: &'static str,
        message: String,
    },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    /// Maps a non-success HTTP status onto the error taxonomy.
    pub fn from_status(service: &'static str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => AppError::Auth { service, status },
            429 => AppError::RateLimited(service),
            _ => AppError::Http {
                service,
                status,
                body: body.chars().take(200).collect(),
            },
        }
    }

    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AppError::Timeout(service);
        }
        if let Some(status) = err.status() {
            return AppError::from_status(service, status.as_u16(), err.to_string());
        }
        if err.is_decode() {
            return AppError::Malformed(format!("{} body could not be decoded: {}", service, err));
        }
        AppError::Network {
            service,
            message: err.to_string(),
        }
    }

    /// Whether another attempt has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::RateLimited(_)
            | AppError::Timeout(_)
            | AppError::Network { .. }
            | AppError::Malformed(_) => true,
            AppError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::Auth { .. })
    }

    /// Short, human-facing explanation used in the chat report.
    pub fn user_detail(&self) -> String {
        match self {
            AppError::Auth { status: 401, .. } => "401 Unauthorized - check API key".to_string(),
            AppError::Auth { status, .. } => format!("{} Forbidden - check API key permissions", status),
            AppError::RateLimited(_) => "Rate limit exceeded - too many requests".to_string(),
            AppError::Http { status: 503, .. } => "503 Service unavailable - API temporarily down".to_string(),
            AppError::Http { status, .. } if *status >= 500 => {
                format!("{} Server error - API having issues", status)
            }
            AppError::Http { status, .. } => format!("{} Client error - invalid request", status),
            AppError::Timeout(_) => "Connection timeout - API not responding".to_string(),
            AppError::Network { .. } => "Connection failed - network issue or API down".to_string(),
            AppError::Malformed(_) => "LLM returned invalid format - analysis failed".to_string(),
            other => {
                let text = other.to_string();
                if text.chars().count() > 100 {
                    format!("{}...", text.chars().take(100).collect::<String>())
                } else {
                    text
                }
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
