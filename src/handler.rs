//! HTTP connection handler
//!
//! Serves exactly one request per connection: reads the request head,
//! dispatches it to the `ChatServer`, writes the response and closes.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info_span, Instrument};

use crate::connection::Connection;
use crate::error::AppError;
use crate::message::{Request, Response, ACK_BODY, CHAT_HTML};
use crate::server::ChatServer;

/// Longest request or header line accepted
const MAX_LINE_BYTES: u64 = 8 * 1024;

/// Header lines read (and ignored) after the request line
const MAX_HEADER_LINES: usize = 100;

/// Handle one accepted connection
///
/// The connection is closed when this returns, on success or error.
pub async fn handle_connection(
    conn: Connection,
    server: Arc<ChatServer>,
    request_timeout: Duration,
) -> Result<(), AppError> {
    let span = info_span!("conn", id = %conn.id, peer = %conn.peer);
    serve_request(conn.stream, &server, request_timeout)
        .instrument(span)
        .await
}

async fn serve_request(
    stream: TcpStream,
    server: &ChatServer,
    request_timeout: Duration,
) -> Result<(), AppError> {
    let mut reader = BufReader::new(stream);

    let line = tokio::time::timeout(request_timeout, read_request_head(&mut reader))
        .await
        .map_err(|_| AppError::RequestTimeout)??;

    let response = match std::str::from_utf8(&line) {
        Ok(line) => {
            debug!("Request: {}", line.trim_end());
            dispatch(server, line).await
        }
        Err(_) => {
            debug!("Request line is not UTF-8");
            Response::not_found()
        }
    };

    let bytes = response.to_bytes();
    let stream = reader.get_mut();
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    stream.shutdown().await?;

    debug!("Replied {:?} with {} bytes", response.status, bytes.len());
    Ok(())
}

/// Route a request line and run it against the server
pub async fn dispatch(server: &ChatServer, line: &str) -> Response {
    let request = Request::parse(line);
    if let Some(request) = &request {
        debug!("Routed to room '{}'", request.room());
    }

    match request {
        Some(Request::Page { room }) => {
            server.load_room(&room);
            Response::html(CHAT_HTML)
        }
        Some(Request::Pull { room, last }) => Response::text(server.pull_since(&room, last).await),
        Some(Request::Push { room, message }) => {
            server.post_message(&room, &message);
            Response::text(ACK_BODY)
        }
        None => {
            debug!("Unroutable request: {}", line.trim_end());
            Response::not_found()
        }
    }
}

/// Read the raw request line, then drain header lines up to the blank line
///
/// Header bytes are discarded without decoding.
async fn read_request_head<R>(reader: &mut R) -> Result<Vec<u8>, AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    if read_bounded_line(reader, &mut line).await? == 0 {
        return Err(AppError::EmptyRequest);
    }

    let mut header = Vec::new();
    for _ in 0..MAX_HEADER_LINES {
        header.clear();
        let n = read_bounded_line(reader, &mut header).await?;
        if n == 0 || header.iter().all(u8::is_ascii_whitespace) {
            break;
        }
    }

    Ok(line)
}

async fn read_bounded_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<usize, AppError>
where
    R: AsyncBufRead + Unpin,
{
    Ok(reader.take(MAX_LINE_BYTES).read_until(b'\n', buf).await?)
}
