//! Request/response streaming binding.
//!
//! `POST /api/v1/sessions` opens a session whose stdin is the request body
//! and whose output is the response body. The session ID is returned
//! synchronously in the `x-session-id` header so a client can address
//! control requests at it while the body is still streaming.

use std::convert::Infallible;

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::handlers::AppState;
use super::types::{error_status, ErrorResponse, SizeQuery};
use crate::bridge::Admission;

/// Response header carrying the session ID.
pub const SESSION_ID_HEADER: &str = "x-session-id";

const CHANNEL_CAPACITY: usize = 64;

/// Open a streaming session.
///
/// The end of the request body only means no more input; the session keeps
/// running until the process exits, the client drops the response, or the
/// session is deleted. The process never sees an end-of-file from a finished
/// body, so a program that reads stdin to the end (`cat`, `sort`) runs until
/// the client closes the response or calls `DELETE /api/v1/sessions/{id}`.
pub async fn stream_session(
    State(state): State<AppState>,
    Extension(admission): Extension<Admission>,
    Query(query): Query<SizeQuery>,
    body: Body,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let size = query.size(state.bridge.default_size());
    let connection = admission
        .open(size)
        .map_err(|e| (error_status(&e), Json(ErrorResponse::from_error(&e))))?;
    let id = connection.id();

    let (in_tx, in_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
    let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
    let client_gone = out_tx.clone();

    tokio::spawn(async move {
        let mut body = body.into_data_stream();
        let forward = async {
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) if bytes.is_empty() => continue,
                    Ok(bytes) => {
                        if in_tx.send(bytes.to_vec()).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        debug!(session_id = %id, error = %e, "Request body failed");
                        return;
                    }
                }
            }
            // Input is done; stay attached until the session ends.
            in_tx.closed().await;
        };

        // Dropping the response closes the output channel; dropping `in_tx`
        // then ends the session from the transport side.
        tokio::select! {
            () = forward => {}
            () = client_gone.closed() => {
                debug!(session_id = %id, "Response dropped by client");
            }
        }
    });

    tokio::spawn(async move {
        let outcome = connection.run(in_rx, out_tx).await;
        debug!(session_id = %id, reason = %outcome.reason(), "Streaming session finished");
    });

    let output = stream::unfold(out_rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|chunk| (Ok::<_, Infallible>(Bytes::from(chunk)), rx))
    });

    let mut response = Body::from_stream(output).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        headers.insert(SESSION_ID_HEADER, value);
    }
    Ok(response)
}
