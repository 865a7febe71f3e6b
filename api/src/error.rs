#[cfg(debug_assertions)]
use std::collections::HashMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
#[cfg(debug_assertions)]
use serde_json::Value;

/// Errors caused by the request itself, as opposed to failures of the server.
pub trait ApiRequestError: std::error::Error {
    fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Machine-readable code sent as `error.code`.
    fn code(&self) -> &'static str {
        "invalid-argument"
    }
}

#[derive(Debug)]
pub enum AppError {
    Request {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
    ServerError {
        message: String,

        #[cfg(debug_assertions)]
        backtrace: Option<backtrace::Backtrace>,
    },
}

impl AppError {
    pub fn request<E: ApiRequestError>(e: E) -> Self {
        AppError::Request {
            status: e.status_code(),
            code: e.code(),
            message: e.to_string(),
        }
    }

    /// An internal error whose message is `"{context}: {cause}"`.
    pub fn internal(context: &str, cause: impl std::fmt::Display) -> Self {
        AppError::ServerError {
            message: format!("{context}: {cause}"),

            #[cfg(debug_assertions)]
            backtrace: Some(backtrace::Backtrace::new()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,

    #[cfg(debug_assertions)]
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_info: Option<HashMap<&'static str, Value>>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status_code, error) = match self {
            AppError::Request {
                status,
                code,
                message,
            } => (
                status,
                ErrorBody {
                    code,
                    message,
                    #[cfg(debug_assertions)]
                    debug_info: None,
                },
            ),
            AppError::ServerError {
                message,
                #[cfg(debug_assertions)]
                backtrace,
            } => {
                tracing::error!(%message, "Request failed with an internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "internal",
                        message,
                        #[cfg(debug_assertions)]
                        debug_info: backtrace.as_ref().map(|bt| {
                            HashMap::from([(
                                "backtrace",
                                serde_json::to_value(filter_backtrace(bt)).unwrap_or_default(),
                            )])
                        }),
                    },
                )
            }
        };

        (status_code, Json(ErrorResponse { error })).into_response()
    }
}

impl From<(&'static str, StatusCode)> for AppError {
    fn from((message, status): (&'static str, StatusCode)) -> Self {
        AppError::Request {
            status,
            code: code_for_status(status),
            message: message.into(),
        }
    }
}

impl From<(String, StatusCode)> for AppError {
    fn from((message, status): (String, StatusCode)) -> Self {
        AppError::Request {
            status,
            code: code_for_status(status),
            message,
        }
    }
}

fn code_for_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => "unauthenticated",
        StatusCode::FORBIDDEN => "permission-denied",
        StatusCode::NOT_FOUND => "not-found",
        s if s.is_server_error() => "internal",
        _ => "invalid-argument",
    }
}

#[cfg(debug_assertions)]
#[derive(Serialize, Debug)]
struct FrameInfo {
    name: String,
    loc: String,
}

#[cfg(debug_assertions)]
fn filter_backtrace(backtrace: &backtrace::Backtrace) -> Vec<FrameInfo> {
    const MODULE_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");
    let mut frames_info: Vec<FrameInfo> = Vec::new();

    for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            if let (Some(name), Some(filename), Some(lineno)) = (
                symbol.name().map(|n| n.to_string()),
                symbol.filename().map(|f| f.to_owned()),
                symbol.lineno(),
            ) {
                if name.contains(MODULE_PREFIX) {
                    frames_info.push(FrameInfo {
                        name,
                        loc: format!("{}:{}", filename.display(), lineno),
                    });
                }
            }
        }
    }

    frames_info
}
