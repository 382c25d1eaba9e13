//! Range reads against object storage.

use std::ops::Range;

use crate::error::NiqueryError;
use crate::header::{DEFAULT_RANGE_BYTES, decode_timepoints};
use crate::remote::{RemoteLocation, TimepointReader};

/// Byte-range access to objects in a bucket.
pub trait ObjectStore: Send + Sync {
    fn get_range(&self, bucket: &str, key: &str, range: Range<u64>)
    -> Result<Vec<u8>, NiqueryError>;
}

pub struct ObjectStoreTimepointReader<S: ObjectStore> {
    store: S,
    range_bytes: u64,
}

impl<S: ObjectStore> ObjectStoreTimepointReader<S> {
    pub fn new(store: S) -> Self {
        Self::with_range_bytes(store, DEFAULT_RANGE_BYTES)
    }

    pub fn with_range_bytes(store: S, range_bytes: u64) -> Self {
        Self {
            store,
            range_bytes: range_bytes.max(1),
        }
    }
}

impl<S: ObjectStore> TimepointReader for ObjectStoreTimepointReader<S> {
    fn fetch_timepoints(&self, location: &RemoteLocation) -> Result<u64, NiqueryError> {
        let RemoteLocation::Object { bucket, key } = location else {
            return Err(NiqueryError::UnsupportedLocation(location.to_string()));
        };
        let payload = self.store.get_range(bucket, key, 0..self.range_bytes)?;
        decode_timepoints(&payload)
    }
}

#[cfg(feature = "s3")]
pub use aws::S3ObjectStore;

#[cfg(feature = "s3")]
mod aws {
    use std::ops::Range;
    use std::sync::Arc;

    use aws_config::{BehaviorVersion, Region};
    use tokio::runtime::Runtime;

    use super::ObjectStore;
    use crate::error::NiqueryError;

    const DEFAULT_REGION: &str = "us-east-1";

    /// S3 client for public catalogue buckets.
    ///
    /// Requests are unsigned unless `signed` is set, in which case credentials are
    /// resolved from the standard AWS chain. `NIQUERY_S3_ENDPOINT_URL` overrides the
    /// endpoint (path-style addressing is then forced).
    ///
    /// The store owns a small multi-threaded runtime; pool workers block on it
    /// concurrently. Must not be used from inside another tokio runtime.
    #[derive(Debug, Clone)]
    pub struct S3ObjectStore {
        client: aws_sdk_s3::Client,
        runtime: Arc<Runtime>,
    }

    impl S3ObjectStore {
        pub fn from_env(signed: bool) -> Result<Self, NiqueryError> {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("niquery-s3")
                .enable_all()
                .build()
                .map_err(|err| {
                    NiqueryError::RemoteFetch(format!("tokio runtime init failed: {err}"))
                })?;
            let client = runtime.block_on(client_from_env(signed));
            Ok(Self {
                client,
                runtime: Arc::new(runtime),
            })
        }
    }

    async fn client_from_env(signed: bool) -> aws_sdk_s3::Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !signed {
            loader = loader.no_credentials();
        }
        let cfg = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&cfg);
        if cfg.region().is_none() {
            builder = builder.region(Region::new(DEFAULT_REGION));
        }
        if let Ok(url) = std::env::var("NIQUERY_S3_ENDPOINT_URL") {
            if !url.trim().is_empty() {
                builder = builder.endpoint_url(url.trim()).force_path_style(true);
            }
        }
        aws_sdk_s3::Client::from_conf(builder.build())
    }

    impl ObjectStore for S3ObjectStore {
        fn get_range(
            &self,
            bucket: &str,
            key: &str,
            range: Range<u64>,
        ) -> Result<Vec<u8>, NiqueryError> {
            if range.is_empty() {
                return Ok(Vec::new());
            }
            let header = format!("bytes={}-{}", range.start, range.end - 1);
            let request = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .range(header);
            self.runtime.block_on(async move {
                let output = request
                    .send()
                    .await
                    .map_err(|err| NiqueryError::RemoteFetch(format!("s3 get_object: {err:?}")))?;
                let bytes = output.body.collect().await.map_err(|err| {
                    NiqueryError::RemoteFetch(format!("s3 body collect: {err:?}"))
                })?;
                Ok::<Vec<u8>, NiqueryError>(bytes.into_bytes().to_vec())
            })
        }
    }
}
