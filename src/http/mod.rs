//! HTTP surface: `GET /health` and `POST /convert`.

pub mod error;

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, RawQuery, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;
use url::form_urlencoded;
use uuid::Uuid;

use crate::convert::{ConvertOptions, Converter, PdfDocument, parse_flag};
pub use error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<dyn Converter>,
}

/// Query parameters accepted by `/convert`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConvertQuery {
    pub page: Option<String>,
    pub debug_html: Option<String>,
    pub unsafe_html: Option<String>,
}

impl ConvertQuery {
    /// Parse a raw query string. Unknown keys are ignored and the first
    /// occurrence of a repeated key wins, so parsing never fails.
    pub fn parse(query: Option<&str>) -> Self {
        let mut parsed = Self::default();
        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "page" => &mut parsed.page,
                "debug_html" => &mut parsed.debug_html,
                "unsafe" => &mut parsed.unsafe_html,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        parsed
    }

    pub fn to_options(&self) -> ConvertOptions {
        let options = match self.page.as_deref() {
            Some(page) => ConvertOptions::default().with_page(page),
            None => ConvertOptions::default(),
        };
        options
            .with_debug_html(parse_flag(self.debug_html.as_deref()))
            .with_unsafe_html(parse_flag(self.unsafe_html.as_deref()))
    }
}

/// Build the gateway router. Bodies above `max_body_bytes` are rejected
/// by the extractor with `413` before the handler runs.
pub fn gateway_routes(converter: Arc<dyn Converter>, max_body_bytes: usize) -> Router {
    let state = AppState { converter };

    Router::new()
        .route("/health", get(health))
        .route("/convert", post(convert))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

#[tracing::instrument(
    skip_all,
    fields(request_id = %Uuid::new_v4(), body_bytes = body.len())
)]
async fn convert(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, ApiError> {
    if body.is_empty() {
        return Err(ApiError::MissingBody);
    }

    let options = ConvertQuery::parse(query.as_deref()).to_options();
    info!(
        page = %options.page,
        debug_html = options.debug_html,
        unsafe_html = options.unsafe_html,
        "Converting message"
    );

    let doc = state.converter.convert(&body, &options).await?;
    Ok(pdf_response(doc))
}

/// Serve the PDF inline, suggesting the converter's output name.
fn pdf_response(doc: PdfDocument) -> Response {
    let disposition = content_disposition(&doc.filename);
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        doc.bytes,
    )
        .into_response()
}

/// `inline` disposition with an ASCII `filename` fallback and, for names
/// that need it, the exact name as RFC 5987 `filename*`.
fn content_disposition(filename: &str) -> String {
    let fallback = header_safe_filename(filename);
    if fallback == filename || filename.is_empty() {
        return format!("inline; filename=\"{fallback}\"");
    }
    // byte_serialize is form encoding: a literal '+' comes out as %2B, so
    // any remaining '+' is a space.
    let encoded = form_urlencoded::byte_serialize(filename.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    format!("inline; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

/// Reduce a file name to characters valid inside a quoted header value.
fn header_safe_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim().is_empty() {
        "message.pdf".to_string()
    } else {
        cleaned
    }
}
