use std::error::Error as _;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sideport_device::{ByteSource, SourceError};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Reads a local file one chunk at a time.
pub struct FileSource {
    file: tokio::fs::File,
    total: u64,
    chunk_size: usize,
}

impl FileSource {
    /// Open `path` for streaming.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or its size queried.
    pub async fn open(path: &Path, chunk_size: usize) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        let total = file.metadata().await?.len();
        Ok(Self {
            file,
            total,
            chunk_size: chunk_size.max(1),
        })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    fn total_len(&self) -> u64 {
        self.total
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        let mut buffer = vec![0_u8; self.chunk_size];
        let read = self.file.read(&mut buffer).await?;
        if read == 0 {
            return Ok(None);
        }
        buffer.truncate(read);
        Ok(Some(buffer))
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("download request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download from {url} failed with HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Client for package downloads.
///
/// Bodies are pulled at the pace of the device push, so only connecting and
/// each individual read are bounded; there is no deadline for the whole body.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialised.
pub fn streaming_client(
    connect_timeout: Duration,
    idle_timeout: Duration,
) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(idle_timeout)
        .user_agent(format!("sideport/{}", env!("CARGO_PKG_VERSION")))
        .build()
}

/// `error` followed by each of its causes, so a failed body read says why.
fn describe_read_error(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut cause = error.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}

/// Streams an HTTP response body without buffering it locally.
pub struct HttpSource {
    stream: BoxStream<'static, Result<Vec<u8>, SourceError>>,
    total: u64,
}

impl HttpSource {
    /// Start downloading `url`; the body is pulled as the push consumes it.
    ///
    /// # Errors
    /// Returns an error when the request fails or the server answers with a
    /// non-success status.
    pub async fn open(client: &reqwest::Client, url: &str) -> Result<Self, DownloadError> {
        let response = client
            .get(url)
            .header("User-Agent", "sideport")
            .send()
            .await
            .map_err(|source| DownloadError::Request {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let total = response.content_length().unwrap_or(0);
        let stream = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|error| SourceError::Read(describe_read_error(&error)))
            })
            .boxed();

        Ok(Self { stream, total })
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    fn total_len(&self) -> u64 {
        self.total
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        self.stream.next().await.transpose()
    }
}

/// Aborts the wrapped source as soon as `token` is cancelled.
pub struct CancellableSource {
    inner: Box<dyn ByteSource>,
    token: CancellationToken,
}

impl CancellableSource {
    #[must_use]
    pub fn new(inner: Box<dyn ByteSource>, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

#[async_trait]
impl ByteSource for CancellableSource {
    fn total_len(&self) -> u64 {
        self.inner.total_len()
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(SourceError::Cancelled),
            chunk = self.inner.next_chunk() => chunk,
        }
    }
}

/// File name a download URL would produce, ignoring query and fragment.
#[must_use]
pub fn file_name_from_url(url: &str) -> Option<&str> {
    let without_suffix = url.split(['?', '#']).next().unwrap_or(url);
    without_suffix
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    async fn drain(source: &mut dyn ByteSource) -> Result<Vec<u8>, SourceError> {
        let mut out = Vec::new();
        while let Some(chunk) = source.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn file_source_reads_in_chunks() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("game.apk");
        std::fs::write(&path, b"0123456789").expect("fixture should be written");

        let mut source = FileSource::open(&path, 4)
            .await
            .expect("file should open");

        assert_eq!(source.total_len(), 10);
        assert_eq!(
            source.next_chunk().await.expect("read should succeed"),
            Some(b"0123".to_vec())
        );
        assert_eq!(drain(&mut source).await.expect("drain"), b"456789".to_vec());
        assert_eq!(source.next_chunk().await.expect("eof"), None);
    }

    #[tokio::test]
    async fn http_source_streams_body_with_length() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/dl/game.apk");
                then.status(200).body("apk-bytes");
            })
            .await;

        let mut source = HttpSource::open(&reqwest::Client::new(), &server.url("/dl/game.apk"))
            .await
            .expect("download should start");

        assert_eq!(source.total_len(), 9);
        assert_eq!(drain(&mut source).await.expect("drain"), b"apk-bytes".to_vec());
    }

    #[tokio::test]
    async fn slow_consumer_outlasts_idle_timeout() {
        let body = vec![7_u8; 256 * 1024];
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/dl/big.apk");
                then.status(200).body(body.clone());
            })
            .await;
        let client = streaming_client(Duration::from_secs(2), Duration::from_millis(300))
            .expect("client should build");

        let mut source = HttpSource::open(&client, &server.url("/dl/big.apk"))
            .await
            .expect("download should start");
        tokio::time::sleep(Duration::from_millis(500)).await;

        let mut received = Vec::new();
        while let Some(chunk) = source.next_chunk().await.expect("read should not time out") {
            received.extend_from_slice(&chunk);
            tokio::time::sleep(Duration::from_millis(150)).await;
        }

        assert_eq!(received.len(), body.len());
    }

    #[tokio::test]
    async fn read_error_description_includes_causes() {
        let error = reqwest::Client::new()
            .get("http://127.0.0.1:1/game.apk")
            .send()
            .await
            .expect_err("nothing listens on port 1");

        let message = describe_read_error(&error);

        assert!(message.starts_with(&error.to_string()));
        assert!(message.len() > error.to_string().len(), "no cause in {message:?}");
    }

    #[tokio::test]
    async fn http_source_rejects_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.apk");
                then.status(404);
            })
            .await;

        let result = HttpSource::open(&reqwest::Client::new(), &server.url("/missing.apk")).await;

        assert!(matches!(
            result,
            Err(DownloadError::HttpStatus { status, .. }) if status == reqwest::StatusCode::NOT_FOUND
        ));
    }

    #[tokio::test]
    async fn cancelled_token_aborts_next_read() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let path = temp.path().join("game.apk");
        std::fs::write(&path, b"0123456789").expect("fixture should be written");

        let token = CancellationToken::new();
        let inner = FileSource::open(&path, 4).await.expect("file should open");
        let mut source = CancellableSource::new(Box::new(inner), token.clone());

        assert!(source.next_chunk().await.expect("first read").is_some());
        token.cancel();
        assert_eq!(source.next_chunk().await, Err(SourceError::Cancelled));
    }

    #[test]
    fn file_name_from_url_drops_query() {
        assert_eq!(
            file_name_from_url("https://dl.example/v1/My%20Game.apk?token=1#x"),
            Some("My%20Game.apk")
        );
        assert_eq!(file_name_from_url("https://dl.example/"), None);
        assert_eq!(file_name_from_url("https://"), None);
    }
}
