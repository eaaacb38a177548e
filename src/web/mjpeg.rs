//! MJPEG camera preview endpoint with HTTP basic auth.
//!
//! While authorized, the client receives a `multipart/x-mixed-replace`
//! body: one JPEG part per captured frame, indefinitely. Slow clients
//! skip to the newest frame instead of queuing.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use bytes::Bytes;
use futures_util::stream::unfold;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::WebState;

/// Multipart boundary between JPEG parts.
pub const BOUNDARY: &str = "frame";

/// Credentials guarding the camera preview.
#[derive(Debug, Clone)]
pub struct CameraCreds {
    pub user: String,
    pub pass: String,
}

impl CameraCreds {
    /// Check an `Authorization: Basic <base64(user:pass)>` header.
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return false;
        };
        let Some(encoded) = value.strip_prefix("Basic ") else {
            return false;
        };
        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(pair) = String::from_utf8(decoded) else {
            return false;
        };
        match pair.split_once(':') {
            Some((user, pass)) => user == self.user && pass == self.pass,
            None => false,
        }
    }
}

/// GET /camera — authenticated MJPEG stream
pub(crate) async fn stream(
    State(state): State<Arc<WebState>>,
    headers: HeaderMap,
) -> Response {
    let Some(creds) = &state.camera_creds else {
        // No credentials configured: the preview is switched off entirely.
        return StatusCode::NOT_FOUND.into_response();
    };

    if !creds.authorize(&headers) {
        return unauthorized();
    }

    let Some(camera) = &state.camera else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let rx = camera.subscribe();
    let parts = unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(frame) => {
                    return Some((Ok::<Bytes, Infallible>(encode_part(&frame)), rx));
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "MJPEG client lagged, skipping to newest frame");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(parts));

    match response {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Failed to build MJPEG response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn unauthorized() -> Response {
    let response = Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, "Basic realm=\"camera\"")
        .body(Body::empty());
    match response {
        Ok(r) => r,
        Err(_) => StatusCode::UNAUTHORIZED.into_response(),
    }
}

/// Frame one JPEG as a multipart part: boundary, headers, payload, CRLF.
fn encode_part(frame: &Bytes) -> Bytes {
    let head = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        frame.len()
    );
    let mut buf = Vec::with_capacity(head.len() + frame.len() + 2);
    buf.extend_from_slice(head.as_bytes());
    buf.extend_from_slice(frame);
    buf.extend_from_slice(b"\r\n");
    Bytes::from(buf)
}
