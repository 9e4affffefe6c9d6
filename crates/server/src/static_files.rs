//! Static content serving.
//!
//! A request routed here is resolved against the route's content directory and answered
//! with the file, a `304`, a range of it, or one of `404`, `405`, `416`. Every resolved path
//! is canonicalized and must stay inside the canonical content directory, so neither `..`
//! segments nor symlinks can reach files outside it.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use flate2::Compression;
use flate2::write::GzEncoder;
use http::header::{
    ACCEPT_ENCODING, ACCEPT_RANGES, ALLOW, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_RANGE, CONTENT_TYPE, IF_MODIFIED_SINCE, LAST_MODIFIED,
    RANGE,
};
use http::{HeaderValue, Method, StatusCode};
use percent_encoding::percent_decode_str;
use portico_http::connection::ResponseWriter;
use portico_http::protocol::{HttpError, PayloadSize, Request, RequestHeader, ResponseHead, SendError};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, trace};

use crate::mime::MimeTable;
use crate::router::StaticRoute;

/// Files are sent in chunks of this size.
const CHUNK_SIZE: usize = 128 * 1024;

const NOT_FOUND_MESSAGE: &str = "Error 404: Requested content not found!";
const INVALID_DIR_MESSAGE: &str = "Error 500: Internal server error! Invalid content directory.";
const INTERNAL_ERROR_MESSAGE: &str = "Error 500: Internal server error!";

/// Serves files below the content directory of the matched [`StaticRoute`].
#[derive(Debug, Clone)]
pub struct StaticFiles {
    mime_table: Arc<MimeTable>,
    use_gzip: bool,
}

/// What the body of a `200`/`206` is read from.
enum Representation {
    File(File),
    Memory(Bytes),
}

impl StaticFiles {
    pub fn new(mime_table: Arc<MimeTable>, use_gzip: bool) -> Self {
        Self { mime_table, use_gzip }
    }

    pub async fn serve(&self, request: &mut Request<'_>, route: &StaticRoute, writer: &mut ResponseWriter<'_>) -> Result<(), HttpError> {
        let header = request.header();

        if !matches!(*header.method(), Method::GET | Method::HEAD) {
            let mut head = ResponseHead::new(StatusCode::METHOD_NOT_ALLOWED);
            head.append(ALLOW, HeaderValue::from_static("GET, HEAD"));
            head.append(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
            writer.send_response(head, Bytes::from_static(b"405 Method Not Allowed")).await?;
            return Ok(());
        }

        let root = match fs::canonicalize(route.content_dir()).await {
            Ok(root) => root,
            Err(e) => {
                error!(content_dir = %route.content_dir().display(), cause = %e, "invalid content directory");
                writer.send_message(StatusCode::INTERNAL_SERVER_ERROR, INVALID_DIR_MESSAGE).await?;
                return Ok(());
            }
        };

        let Some((path, metadata)) = resolve(&root, &route.strip(header.path())).await else {
            writer.send_message(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE).await?;
            return Ok(());
        };

        let modified = metadata.modified().ok();
        let mut head = ResponseHead::new(StatusCode::OK);
        head.append(CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));
        head.append(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        if let Some(value) = modified.and_then(|modified| HeaderValue::from_str(&httpdate::fmt_http_date(modified)).ok()) {
            head.append(LAST_MODIFIED, value);
        }

        if modified.is_some_and(|modified| is_not_modified(header, modified)) {
            trace!(path = %path.display(), "not modified");
            head.set_status(StatusCode::NOT_MODIFIED);
            writer.send_head(head, PayloadSize::Empty).await?;
            return Ok(());
        }

        let mime = self.mime_table.lookup(&path);
        if let Ok(value) = HeaderValue::from_str(&self.mime_table.content_type(&mime)) {
            head.append(CONTENT_TYPE, value);
        }

        let compress = self.use_gzip && self.mime_table.is_compressible(&mime) && header.header_contains(ACCEPT_ENCODING, "gzip");
        let opened = if compress { gzip(&path).await.map(Representation::Memory) } else { File::open(&path).await.map(Representation::File) };
        let (representation, length) = match opened {
            Ok(Representation::Memory(bytes)) => {
                head.append(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                let length = bytes.len() as u64;
                (Representation::Memory(bytes), length)
            }
            Ok(file) => (file, metadata.len()),
            Err(e) => {
                error!(path = %path.display(), cause = %e, "can't read static file");
                writer.send_message(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE).await?;
                return Ok(());
            }
        };

        let (start, end) = match header.header_str(RANGE) {
            Some(range) => match parse_range(range, length) {
                Some(range) => range,
                None => {
                    debug!(range, length, "unsatisfiable range");
                    let mut unsatisfiable = ResponseHead::new(StatusCode::RANGE_NOT_SATISFIABLE);
                    unsatisfiable.append(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
                    if let Ok(value) = HeaderValue::from_str(&format!("bytes */{length}")) {
                        unsatisfiable.append(CONTENT_RANGE, value);
                    }
                    writer.send_head(unsatisfiable, PayloadSize::Empty).await?;
                    return Ok(());
                }
            },
            None => (0, length.saturating_sub(1)),
        };

        let span = if length == 0 { 0 } else { end - start + 1 };
        if span < length {
            head.set_status(StatusCode::PARTIAL_CONTENT);
            if let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{length}")) {
                head.append(CONTENT_RANGE, value);
            }
        }

        writer.send_head(head, PayloadSize::new_length(span)).await?;
        if writer.is_finished() {
            return Ok(());
        }

        match representation {
            Representation::Memory(bytes) => send_memory(writer, bytes, start, span).await?,
            Representation::File(file) => send_file(writer, file, start, span).await?,
        }
        writer.finish().await?;
        Ok(())
    }
}

/// Joins the decoded request path to `root` and returns the canonical regular file it names.
///
/// `None` covers every failure: undecodable paths, missing files, anything that is not a
/// regular file, and any path whose canonical form escapes `root`.
async fn resolve(root: &Path, relative: &str) -> Option<(PathBuf, std::fs::Metadata)> {
    let decoded = percent_decode_str(relative).decode_utf8().ok()?;
    let mut path = contained(root, &root.join(decoded.trim_start_matches('/'))).await?;
    let mut metadata = fs::metadata(&path).await.ok()?;

    if metadata.is_dir() {
        path = contained(root, &path.join("index.html")).await?;
        metadata = fs::metadata(&path).await.ok()?;
    }

    metadata.is_file().then_some((path, metadata))
}

/// Canonicalizes `path`, requiring it to be `root` or a descendant of it.
async fn contained(root: &Path, path: &Path) -> Option<PathBuf> {
    let canonical = fs::canonicalize(path).await.ok()?;
    if !canonical.starts_with(root) {
        debug!(path = %path.display(), "path escapes the content directory");
        return None;
    }
    Some(canonical)
}

/// Whether `If-Modified-Since` is at or after the modification time, at one-second resolution.
fn is_not_modified(header: &RequestHeader, modified: SystemTime) -> bool {
    let Some(since) = header.header_str(IF_MODIFIED_SINCE).and_then(|value| httpdate::parse_http_date(value).ok()) else {
        return false;
    };
    unix_seconds(since) >= unix_seconds(modified)
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map_or(0, |duration| duration.as_secs())
}

/// Parses `bytes=START-END` against a representation of `length` bytes.
///
/// A missing start means 0 and a missing end means the last byte. Returns `None` when the
/// header is malformed, names several ranges, leaves out both bounds, or falls outside
/// `[0, length - 1]`.
fn parse_range(value: &str, length: u64) -> Option<(u64, u64)> {
    let ranges = value.trim().strip_prefix("bytes=")?;
    let (start, end) = ranges.split_once('-')?;
    if start.is_empty() && end.is_empty() {
        return None;
    }

    let start = if start.is_empty() { 0 } else { parse_position(start)? };
    let end = if end.is_empty() { length.checked_sub(1)? } else { parse_position(end)? };
    (start <= end && end < length).then_some((start, end))
}

fn parse_position(digits: &str) -> Option<u64> {
    if digits.bytes().all(|b| b.is_ascii_digit()) { digits.parse().ok() } else { None }
}

/// Compresses the whole file on the blocking pool.
async fn gzip(path: &Path) -> io::Result<Bytes> {
    let raw = fs::read(path).await?;
    tokio::task::spawn_blocking(move || {
        let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
        encoder.write_all(&raw)?;
        encoder.finish().map(Bytes::from)
    })
    .await
    .map_err(io::Error::other)?
}

async fn send_memory(writer: &mut ResponseWriter<'_>, bytes: Bytes, start: u64, span: u64) -> Result<(), SendError> {
    let start = usize::try_from(start).map_err(SendError::invalid_body)?;
    let span = usize::try_from(span).map_err(SendError::invalid_body)?;
    let mut body = bytes.slice(start..start + span);
    while !body.is_empty() {
        let chunk = body.split_to(body.len().min(CHUNK_SIZE));
        writer.send_chunk(chunk).await?;
    }
    Ok(())
}

async fn send_file(writer: &mut ResponseWriter<'_>, mut file: File, start: u64, span: u64) -> Result<(), SendError> {
    if start > 0 {
        file.seek(io::SeekFrom::Start(start)).await.map_err(|e| SendError::invalid_body(format!("can't seek static file: {e}")))?;
    }

    let mut remaining = span;
    while remaining > 0 {
        let want = usize::try_from(remaining).map_or(CHUNK_SIZE, |remaining| remaining.min(CHUNK_SIZE));
        let mut buf = BytesMut::zeroed(want);
        let read = file.read(&mut buf).await.map_err(|e| SendError::invalid_body(format!("can't read static file: {e}")))?;
        if read == 0 {
            return Err(SendError::invalid_body("static file shrank while sending"));
        }
        buf.truncate(read);
        // a failed send means the client is gone, the error only closes the connection
        writer.send_chunk(buf.freeze()).await?;
        remaining -= read as u64;
    }
    Ok(())
}
