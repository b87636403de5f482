use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// Errors surfaced by the payments API
#[derive(thiserror::Error, Debug)]
pub enum PaymentError {
    /// Invalid request payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Charge processor unreachable or answered with an error
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ResponseError for PaymentError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code).json(serde_json::json!({
            "error": {
                "message": self.to_string(),
                "code": status_code.as_u16(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::Validation(_) => StatusCode::BAD_REQUEST,
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        PaymentError::Upstream(e.to_string())
    }
}
