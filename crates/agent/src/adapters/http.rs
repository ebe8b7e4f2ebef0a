// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal HTTP/1.1 client for the Docker Engine Unix-socket API.
//!
//! Hand-rolled on purpose: the adapter needs four verbs and small JSON
//! bodies, not an SDK. Understands Content-Length and chunked bodies and
//! falls back to read-to-end for hijacked streams (exec output).

use std::path::Path;
use std::time::Duration;

use corral_engine::HandlerError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub(crate) async fn get(socket: &Path, path: &str) -> Result<HttpResponse, HandlerError> {
    let request =
        format!("GET {} HTTP/1.1\r\nHost: docker\r\nConnection: close\r\n\r\n", path);
    timed_request(socket, &request).await
}

pub(crate) async fn post(
    socket: &Path,
    path: &str,
    body: &str,
) -> Result<HttpResponse, HandlerError> {
    timed_request(socket, &post_request(path, body)).await
}

/// POST without the client-side timeout, for calls that block until a
/// container transitions (`/containers/{id}/wait`, exec output streams).
pub(crate) async fn post_blocking(
    socket: &Path,
    path: &str,
    body: &str,
) -> Result<HttpResponse, HandlerError> {
    send_request(socket, &post_request(path, body)).await
}

pub(crate) async fn delete(socket: &Path, path: &str) -> Result<HttpResponse, HandlerError> {
    let request =
        format!("DELETE {} HTTP/1.1\r\nHost: docker\r\nConnection: close\r\n\r\n", path);
    timed_request(socket, &request).await
}

fn post_request(path: &str, body: &str) -> String {
    format!(
        "POST {} HTTP/1.1\r\nHost: docker\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        path,
        body.len(),
        body
    )
}

async fn timed_request(socket: &Path, request: &str) -> Result<HttpResponse, HandlerError> {
    tokio::time::timeout(REQUEST_TIMEOUT, send_request(socket, request))
        .await
        .map_err(|_| HandlerError::Runtime("docker api request timed out".to_string()))?
}

async fn send_request(socket: &Path, request: &str) -> Result<HttpResponse, HandlerError> {
    let mut stream = UnixStream::connect(socket)
        .await
        .map_err(|e| HandlerError::Runtime(format!("docker socket connect failed: {}", e)))?;
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| HandlerError::Runtime(format!("docker socket write failed: {}", e)))?;

    let mut reader = BufReader::new(stream);
    read_response(&mut reader).await
}

async fn read_response<R>(reader: &mut R) -> Result<HttpResponse, HandlerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    read_line(reader, &mut line).await?;
    let status = line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| HandlerError::Runtime(format!("malformed status line {:?}", line.trim())))?;

    let mut content_length: Option<usize> = None;
    let mut chunked = false;
    loop {
        line.clear();
        read_line(reader, &mut line).await?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        let lower = trimmed.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("content-length:") {
            content_length = value.trim().parse().ok();
        } else if lower.starts_with("transfer-encoding:") && lower.contains("chunked") {
            chunked = true;
        }
    }

    let mut body = Vec::new();
    if chunked {
        read_chunked(reader, &mut body).await?;
    } else if let Some(length) = content_length {
        body.resize(length, 0);
        reader
            .read_exact(&mut body)
            .await
            .map_err(|e| HandlerError::Runtime(format!("docker socket read failed: {}", e)))?;
    } else {
        // Connection: close, so the stream ends with the body
        reader
            .read_to_end(&mut body)
            .await
            .map_err(|e| HandlerError::Runtime(format!("docker socket read failed: {}", e)))?;
    }
    Ok(HttpResponse { status, body })
}

async fn read_chunked<R>(reader: &mut R, body: &mut Vec<u8>) -> Result<(), HandlerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        read_line(reader, &mut line).await?;
        let size = usize::from_str_radix(line.trim(), 16)
            .map_err(|_| HandlerError::Runtime(format!("malformed chunk size {:?}", line.trim())))?;
        if size == 0 {
            // trailing CRLF after the last chunk
            line.clear();
            let _ = read_line(reader, &mut line).await;
            return Ok(());
        }
        let start = body.len();
        body.resize(start + size, 0);
        reader
            .read_exact(&mut body[start..])
            .await
            .map_err(|e| HandlerError::Runtime(format!("docker socket read failed: {}", e)))?;
        line.clear();
        read_line(reader, &mut line).await?;
    }
}

async fn read_line<R>(reader: &mut R, line: &mut String) -> Result<(), HandlerError>
where
    R: AsyncBufRead + Unpin,
{
    reader
        .read_line(line)
        .await
        .map_err(|e| HandlerError::Runtime(format!("docker socket read failed: {}", e)))?;
    Ok(())
}
