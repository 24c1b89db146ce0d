use serde::{Deserialize, Serialize};

// ============= API Request/Response Types =============

/// Target of an analysis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Company {
    pub fn new(name: impl Into<String>, domain: Option<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.filter(|d| !d.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub company: String,
    #[serde(default)]
    pub domain: Option<String>,
}

impl RunRequest {
    /// Validate the request and turn it into a [`Company`]
    pub fn into_company(self) -> Result<Company> {
        let name = self.company.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput(
                "company name must not be empty".to_string(),
            ));
        }
        Ok(Company::new(name, self.domain.map(|d| d.trim().to_string())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCreated {
    pub run_id: String,
    pub status: crate::runs::RunStatus,
    /// True when an earlier terminal run was served from the cache
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub run_id: String,
    pub cancelled: bool,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map a non-success upstream HTTP status onto the error taxonomy.
    ///
    /// Rate limits and server errors stay in the provider's own variant
    /// (`wrap`), which callers treat as transient; rejected credentials are a
    /// configuration problem and any other 4xx is a bad request.
    pub fn upstream_status(
        status: reqwest::StatusCode,
        body: &str,
        wrap: fn(String) -> AppError,
    ) -> AppError {
        let message = format!("upstream returned {}: {}", status, body);
        match status.as_u16() {
            401 | 403 => AppError::Configuration(message),
            429 => wrap(message),
            400..=499 => AppError::InvalidInput(message),
            _ => wrap(message),
        }
    }

    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::LLM(_) | AppError::Search(_))
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::LLM(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::Search(msg) => (axum::http::StatusCode::BAD_GATEWAY, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (axum::http::StatusCode::CONFLICT, msg),
            AppError::Configuration(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
