use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RANGE, USER_AGENT};

use crate::error::NiqueryError;
use crate::header::{DEFAULT_RANGE_BYTES, decode_timepoints};

/// Where the bytes of one imaging file live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLocation {
    Http { url: String },
    Object { bucket: String, key: String },
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteLocation::Http { url } => write!(f, "{url}"),
            RemoteLocation::Object { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}

/// The catalogue host that dataset files are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteSource {
    Http { base_url: String },
    S3 { bucket: String },
}

impl RemoteSource {
    /// Location of `full_path` inside dataset `dataset_id`.
    pub fn locate(&self, dataset_id: &str, full_path: &str) -> RemoteLocation {
        let key = object_key(dataset_id, full_path);
        match self {
            RemoteSource::Http { base_url } => RemoteLocation::Http {
                url: format!("{}/{}", base_url.trim_end_matches('/'), key),
            },
            RemoteSource::S3 { bucket } => RemoteLocation::Object {
                bucket: bucket.clone(),
                key,
            },
        }
    }
}

impl FromStr for RemoteSource {
    type Err = NiqueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some(rest) = trimmed.strip_prefix("s3://") {
            let bucket = rest.trim_end_matches('/');
            if bucket.is_empty() || bucket.contains('/') {
                return Err(NiqueryError::UnsupportedRemote(value.to_string()));
            }
            return Ok(RemoteSource::S3 {
                bucket: bucket.to_string(),
            });
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(RemoteSource::Http {
                base_url: trimmed.trim_end_matches('/').to_string(),
            });
        }
        Err(NiqueryError::UnsupportedRemote(value.to_string()))
    }
}

impl fmt::Display for RemoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteSource::Http { base_url } => write!(f, "{base_url}"),
            RemoteSource::S3 { bucket } => write!(f, "s3://{bucket}"),
        }
    }
}

pub fn object_key(dataset_id: &str, full_path: &str) -> String {
    format!("{}/{}", dataset_id, full_path.trim_start_matches('/'))
}

/// `Range` header value covering the first `len` bytes.
pub fn leading_range(len: u64) -> String {
    format!("bytes=0-{}", len.max(1) - 1)
}

/// Reads the timepoint count of one remote imaging file.
pub trait TimepointReader: Send + Sync {
    fn fetch_timepoints(&self, location: &RemoteLocation) -> Result<u64, NiqueryError>;
}

#[derive(Debug, Clone)]
pub struct HttpReaderOptions {
    pub range_bytes: u64,
    pub timeout: Duration,
    pub token: Option<String>,
}

impl Default for HttpReaderOptions {
    fn default() -> Self {
        Self {
            range_bytes: DEFAULT_RANGE_BYTES,
            timeout: Duration::from_secs(30),
            token: None,
        }
    }
}

/// Range reads over plain HTTP(S).
#[derive(Clone)]
pub struct HttpTimepointReader {
    client: Client,
    range_bytes: u64,
}

impl HttpTimepointReader {
    pub fn new(options: HttpReaderOptions) -> Result<Self, NiqueryError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("niquery/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| NiqueryError::RemoteFetch(err.to_string()))?,
        );
        if let Some(token) = options.token.as_deref().map(str::trim) {
            if !token.is_empty() {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|err| NiqueryError::RemoteFetch(err.to_string()))?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()
            .map_err(|err| NiqueryError::RemoteFetch(err.to_string()))?;
        Ok(Self {
            client,
            range_bytes: options.range_bytes,
        })
    }

    /// Fetches the leading bytes of `url`. At most `range_bytes` are read, even
    /// when the server ignores the range and sends the whole object.
    pub fn fetch_leading_bytes(&self, url: &str) -> Result<Vec<u8>, NiqueryError> {
        let range = leading_range(self.range_bytes);
        let response = self.send_with_retries(|| self.client.get(url).header(RANGE, &range))?;
        let response = Self::handle_status(response, url)?;
        let mut bytes = Vec::new();
        response
            .take(self.range_bytes)
            .read_to_end(&mut bytes)
            .map_err(|err| NiqueryError::RemoteFetch(err.to_string()))?;
        tracing::debug!(url, bytes = bytes.len(), "range read complete");
        Ok(bytes)
    }

    fn handle_status(
        response: reqwest::blocking::Response,
        url: &str,
    ) -> Result<reqwest::blocking::Response, NiqueryError> {
        match response.status() {
            StatusCode::PARTIAL_CONTENT | StatusCode::OK => Ok(response),
            status => Err(NiqueryError::RemoteStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }),
        }
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, NiqueryError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(NiqueryError::RemoteFetch(err.to_string()));
                }
            }
        }
    }
}

impl TimepointReader for HttpTimepointReader {
    fn fetch_timepoints(&self, location: &RemoteLocation) -> Result<u64, NiqueryError> {
        let RemoteLocation::Http { url } = location else {
            return Err(NiqueryError::UnsupportedLocation(location.to_string()));
        };
        let payload = self.fetch_leading_bytes(url)?;
        decode_timepoints(&payload)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
