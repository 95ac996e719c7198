use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docket_core::error::{CoreError, EntityKind};
use docket_shared::ErrorBody;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn not_found(kind: EntityKind) -> Self {
        Self::NotFound(match kind {
            EntityKind::Task => "Task not found".to_string(),
            EntityKind::Category => "Category not found".to_string(),
        })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { kind, .. } => Self::not_found(kind),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(err) => {
                error!(error = %format!("{err:#}"), "request failed");
                err.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody::new(message))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use docket_core::error::CoreError;
    use uuid::Uuid;

    use super::ApiError;

    #[test]
    fn core_errors_map_to_statuses() {
        let missing: ApiError = CoreError::task_not_found(Uuid::nil()).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.to_string(), "Task not found");

        let parse: ApiError = CoreError::Parse("bad".to_string()).into();
        assert_eq!(parse.status(), StatusCode::BAD_REQUEST);
    }
}
