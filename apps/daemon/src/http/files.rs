// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `GET /api/v1/files/{*rel}` — serves files out of the configured
//! `security.root_dir` (`~/.opencli/` by default). Wired straight to
//! [`crate::file_security::resolve_within_root`]; any resolution failure
//! (escape, missing file, unreadable root) comes back as 403 rather than
//! 404, so a client can never distinguish "outside the root" from "does
//! not exist" by status code alone.

use std::path::PathBuf;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn serve_file(State(state): State<AppState>, Path(rel): Path<String>) -> Response {
    state.record_request();

    let root = PathBuf::from(&state.config.security.root_dir);
    let resolved = match crate::file_security::resolve_within_root(&root, &rel) {
        Ok(path) => path,
        Err(reason) => {
            tracing::warn!(requested = %rel, %reason, "file request denied");
            return (StatusCode::FORBIDDEN, "requested path is not allowed").into_response();
        }
    };

    if resolved.is_dir() {
        return (StatusCode::FORBIDDEN, "requested path is a directory").into_response();
    }

    match tokio::fs::read(&resolved).await {
        Ok(bytes) => {
            let mime = mime_guess_from_path(&resolved);
            ([(header::CONTENT_TYPE, mime)], Body::from(bytes)).into_response()
        }
        Err(err) => {
            tracing::error!(path = %resolved.display(), error = %err, "failed to read resolved file");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to read file").into_response()
        }
    }
}

/// A small extension-to-MIME-type guess, avoiding a dependency on
/// `mime_guess` for the handful of media/document types this daemon's
/// local workspace actually produces.
fn mime_guess_from_path(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(std::ffi::OsStr::to_str).map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}
