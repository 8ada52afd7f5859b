use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sensitivity_core::SensitivityError;

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(SensitivityError::InvalidRequest(msg.into()).into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(SensitivityError::UnknownTier(msg.into()).into())
    }

    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<SensitivityError>() {
            Some(SensitivityError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
            Some(SensitivityError::UnknownTier(_)) => StatusCode::NOT_FOUND,
            Some(
                SensitivityError::InvalidTransition { .. }
                | SensitivityError::ConfigNotFound(_)
                | SensitivityError::InvalidConfig(_)
                | SensitivityError::Io(_)
                | SensitivityError::Yaml(_)
                | SensitivityError::Json(_),
            )
            | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_maps_to_400() {
        let err = AppError(SensitivityError::InvalidRequest("missing groupId".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_tier_maps_to_404() {
        let err = AppError(SensitivityError::UnknownTier("secret".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn invalid_transition_maps_to_500() {
        let err = AppError(
            SensitivityError::InvalidTransition {
                from: "started".into(),
                to: "done".into(),
            }
            .into(),
        );
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn foreign_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn constructors_pick_status() {
        assert_eq!(
            AppError::bad_request("x").into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("x").into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError::bad_request("x").into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
