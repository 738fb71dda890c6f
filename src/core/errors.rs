use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};

use crate::templates;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Carries the path the client should come back to after logging in.
    #[error("Login required for {0}")]
    LoginRequired(String),
    #[error("Forbidden")]
    Forbidden,
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Internal Error: {0}")]
    InternalError(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::LoginRequired(_) => StatusCode::FOUND,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let template = match self {
            ApiError::LoginRequired(next) => {
                return HttpResponse::Found()
                    .insert_header((header::LOCATION, login_url(next)))
                    .finish();
            }
            ApiError::NotFound(_) => "core/404.html",
            ApiError::Forbidden => "core/403.html",
            ApiError::BadRequest(_) => "core/400.html",
            ApiError::Database(_) | ApiError::InternalError(_) => {
                tracing::error!(error = %self, "request failed");
                "core/500.html"
            }
        };

        match templates::render_error(template, status) {
            Ok(html) => HttpResponse::build(status)
                .content_type("text/html; charset=utf-8")
                .body(html),
            Err(_) => HttpResponse::build(status).body(status.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

/// Slashes stay readable in `next`, everything else is percent-encoded.
pub fn login_url(next: &str) -> String {
    let encoded = urlencoding::encode(next).replace("%2F", "/");
    format!("/auth/login/?next={}", encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_url_keeps_slashes() {
        assert_eq!(login_url("/create/"), "/auth/login/?next=/create/");
        assert_eq!(
            login_url("/follow/?page=2"),
            "/auth/login/?next=/follow/%3Fpage%3D2"
        );
    }

    #[test]
    fn login_required_redirects() {
        let resp = ApiError::LoginRequired("/create/".to_string()).error_response();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/auth/login/?next=/create/"
        );
    }

    #[test]
    fn missing_records_map_to_404() {
        let err = ApiError::NotFound("post".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_response().status(), StatusCode::NOT_FOUND);
    }
}
