// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The HTTP shell's error type.
//!
//! `opencli_core::CoreError` models the cross-cutting error kinds; this
//! type adds the outer layers the HTTP surface introduces (config load
//! failure, persistence, I/O) and implements [`IntoResponse`] so a
//! handler can simply `?` its way to a `Result<T, DaemonError>` and get
//! error-taxonomy rule 7 for free: an uncaught error becomes HTTP 500
//! with body `{"error": "<message>"}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Core(#[from] opencli_core::CoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("persistence error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A request that is well-formed but refers to something that does
    /// not exist. Handlers that hit this from a plain lookup (not a
    /// pipeline/episode run result) translate it to HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// A request whose body failed validation independent of any
    /// domain/pipeline semantics (e.g. a malformed pipeline structure).
    #[error("{0}")]
    BadRequest(String),
}

impl IntoResponse for DaemonError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "unhandled daemon error");
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

impl From<Box<figment::Error>> for DaemonError {
    fn from(err: Box<figment::Error>) -> Self {
        Self::Config(err.to_string())
    }
}
