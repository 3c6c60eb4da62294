use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::range::{unsatisfied_range, RangePlan};
use crate::state::AppState;
use crate::utils::{blocking, http_date, json_error_response};
use common::{parse_timestamp, Source};
use remote::Connector;

/// Chunks buffered between the remote reader and the client.
const CHANNEL_DEPTH: usize = 4;

struct StreamHead {
    size: u64,
    plan: RangePlan,
}

type ChunkSender = mpsc::Sender<Result<Bytes, io::Error>>;

pub async fn stream_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let catalog = state.catalog.clone();
    let found = blocking(move || {
        let Some(track) = catalog.get_track(&track_id)? else {
            return Ok(Err("track not found"));
        };
        match catalog.get_source(&track.source_id)? {
            Some(source) => Ok(Ok((track, source))),
            None => Ok(Err("source not found")),
        }
    })
    .await;
    let (track, source) = match found {
        Ok(Ok(found)) => found,
        Ok(Err(missing)) => return json_error_response(StatusCode::NOT_FOUND, missing),
        Err(err) => return err.into_response(),
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let chunk_size = state.config.read().stream_chunk_bytes();
    let connector = Arc::clone(&state.connector);
    let path = track.path.clone();

    let (head_tx, head_rx) = oneshot::channel();
    let (chunk_tx, chunk_rx) = mpsc::channel(CHANNEL_DEPTH);
    tokio::task::spawn_blocking(move || {
        pump(connector, source, path, range, chunk_size, head_tx, chunk_tx)
    });

    let head = match head_rx.await {
        Ok(Ok(head)) => head,
        Ok(Err(message)) => {
            warn!("Stream of {} failed: {}", track.path, message);
            return json_error_response(StatusCode::BAD_GATEWAY, message);
        }
        Err(_) => {
            return json_error_response(StatusCode::INTERNAL_SERVER_ERROR, "stream worker stopped")
        }
    };

    let mut builder = Response::builder().header(header::ACCEPT_RANGES, "bytes");
    let content_type = mime_guess::from_path(&track.path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(content_type.as_ref()) {
        builder = builder.header(header::CONTENT_TYPE, value);
    }
    if let Some(modified) = parse_timestamp(&track.created_at).and_then(http_date) {
        builder = builder.header(header::LAST_MODIFIED, modified);
    }

    let body = Body::from_stream(ReceiverStream::new(chunk_rx));
    let response = match head.plan {
        RangePlan::Full => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, head.size)
            .body(body),
        RangePlan::Partial(range) => builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_LENGTH, range.len())
            .header(header::CONTENT_RANGE, range.content_range(head.size))
            .body(body),
        RangePlan::Unsatisfiable => builder
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, unsatisfied_range(head.size))
            .body(Body::empty()),
    };
    response.unwrap_or_else(|err| json_error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
}

/// Runs on a blocking thread: opens a fresh session, reports the size and
/// range decision through `head_tx`, then feeds the body. The remote file
/// and session are released as soon as the body is done or the client has
/// gone away.
fn pump(
    connector: Arc<dyn Connector>,
    source: Source,
    path: String,
    range: Option<String>,
    chunk_size: usize,
    head_tx: oneshot::Sender<Result<StreamHead, String>>,
    chunk_tx: ChunkSender,
) {
    let session = match connector.open(&source) {
        Ok(session) => session,
        Err(err) => {
            let _ = head_tx.send(Err(err.to_string()));
            return;
        }
    };
    let mut file = match session.open_read(&path) {
        Ok(file) => file,
        Err(err) => {
            let _ = head_tx.send(Err(err.to_string()));
            return;
        }
    };
    let size = match file.seek(SeekFrom::End(0)) {
        Ok(size) => size,
        Err(err) => {
            let _ = head_tx.send(Err(format!("{}: {}", path, err)));
            return;
        }
    };

    let plan = RangePlan::resolve(range.as_deref(), size);
    let (start, len) = match plan {
        RangePlan::Full => (0, size),
        RangePlan::Partial(range) => (range.start, range.len()),
        RangePlan::Unsatisfiable => (0, 0),
    };
    if let Err(err) = file.seek(SeekFrom::Start(start)) {
        let _ = head_tx.send(Err(format!("{}: {}", path, err)));
        return;
    }
    if head_tx.send(Ok(StreamHead { size, plan })).is_err() {
        return;
    }

    let mut remaining = len;
    let mut buf = vec![0u8; chunk_size.max(1)];
    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        match file.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => {
                remaining -= n as u64;
                if chunk_tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    debug!("Client went away while streaming {}", path);
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!("Read failed while streaming {}: {}", path, err);
                let _ = chunk_tx.blocking_send(Err(err));
                break;
            }
        }
    }

    drop(file);
    drop(session);
    drop(chunk_tx);
}
