//! Browser client compiled into the binary.
//!
//! Served at `/` and `/public/*` unless an assets directory replaces it.

use axum::extract::Path;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Built-in index page.
pub const INDEX_HTML: &str = include_str!("../assets/index.html");

const JAVASCRIPT: &str = "text/javascript; charset=utf-8";

/// Bundled `/public` files: name, content type, body.
const PUBLIC_FILES: &[(&str, &str, &str)] = &[
    ("game.js", JAVASCRIPT, include_str!("../assets/public/game.js")),
    ("nes.js", JAVASCRIPT, include_str!("../assets/public/nes.js")),
];

/// Look up a bundled `/public` file, returning its content type and body.
pub fn public_file(name: &str) -> Option<(&'static str, &'static str)> {
    PUBLIC_FILES
        .iter()
        .find(|(file, _, _)| *file == name)
        .map(|(_, content_type, body)| (*content_type, *body))
}

/// `GET /public/{file}` from the bundled client.
pub async fn public_handler(Path(file): Path<String>) -> Response {
    match public_file(&file) {
        Some((content_type, body)) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
