use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::fmt::{self, Display};

pub const CONFIGURATION_ERROR: i32 = 1;
pub const ROUTE_FETCH_ERROR: i32 = 2;
pub const EMPTY_RESULT_ERROR: i32 = 3;
pub const UNEXPECTED_ERROR: i32 = 4;
pub const INVALID_STATE_ERROR: i32 = 100;
pub const INVALID_INPUT_ERROR: i32 = 101;
pub const NOT_FOUND_ERROR: i32 = 102;

#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            NOT_FOUND_ERROR => (StatusCode::NOT_FOUND, self.message.as_str()),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn configuration_error(message: impl Into<String>) -> Error {
    Error {
        code: CONFIGURATION_ERROR,
        message: message.into(),
    }
}

pub fn missing_credential_error() -> Error {
    configuration_error("directions service credential is not configured")
}

pub fn incomplete_route_error() -> Error {
    configuration_error("origin and destination are required")
}

pub fn route_fetch_error(message: impl Into<String>) -> Error {
    Error {
        code: ROUTE_FETCH_ERROR,
        message: message.into(),
    }
}

pub fn reqwest_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        return route_fetch_error("route request timed out");
    }

    route_fetch_error(format!("route request failed: {}", err))
}

pub fn empty_result_error() -> Error {
    Error {
        code: EMPTY_RESULT_ERROR,
        message: "no routes found".into(),
    }
}

pub fn unexpected_error<T: Display>(err: T) -> Error {
    Error {
        code: UNEXPECTED_ERROR,
        message: format!("unexpected error: {}", err),
    }
}

pub fn invalid_state_error() -> Error {
    Error {
        code: INVALID_STATE_ERROR,
        message: "invalid state".into(),
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: INVALID_INPUT_ERROR,
        message: "invalid input".into(),
    }
}

pub fn not_found_error() -> Error {
    Error {
        code: NOT_FOUND_ERROR,
        message: "session not found".into(),
    }
}

#[test]
fn internal_errors_hide_their_message() {
    let response = missing_credential_error().into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let response = not_found_error().into_response();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = invalid_input_error().into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
