//! services/api/src/adapters/storage.rs
//!
//! The object-store adapter, implementing the `ContentStore` port on top of any
//! S3-compatible service (AWS S3, MinIO, Supabase storage's S3 gateway).

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use pdf_assistant_core::ports::{ContentStore, PortError, PortResult};
use tracing::{debug, info, warn};

use crate::config::StorageConfig;

#[derive(Clone)]
pub struct S3ContentStore {
    client: Client,
}

impl S3ContentStore {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "pdf-assistant",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

/// Maps an SDK failure onto the port taxonomy. The full error chain is rendered
/// since the operation-specific error types differ per call.
fn map_sdk_error(context: &str, name: &str, e: impl std::fmt::Display) -> PortError {
    let message = e.to_string();
    if message.contains("404") || message.contains("NoSuchKey") || message.contains("NoSuchBucket") {
        PortError::NotFound(name.to_string())
    } else {
        PortError::Transport(format!("{} {}: {}", context, name, message))
    }
}

/// Creates every bucket that does not exist yet. Failures are logged; the
/// service still starts and the first request against the bucket reports them.
pub async fn provision_buckets(store: &dyn ContentStore, buckets: &[&str]) {
    for bucket in buckets {
        if let Err(e) = store.ensure_bucket(bucket).await {
            warn!("Could not prepare bucket '{}': {}", bucket, e);
        }
    }
}

#[async_trait]
impl ContentStore for S3ContentStore {
    async fn list_blobs(&self, bucket: &str) -> PortResult<Vec<String>> {
        let mut names = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| map_sdk_error("Failed to list", bucket, DisplayErrorContext(&e)))?;

            names.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            if !response.is_truncated().unwrap_or(false) {
                break;
            }
            continuation_token = response.next_continuation_token().map(str::to_string);
            if continuation_token.is_none() {
                break;
            }
        }

        debug!(bucket, count = names.len(), "objects listed");
        Ok(names)
    }

    async fn download(&self, bucket: &str, name: &str) -> PortResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| map_sdk_error("Failed to get", name, DisplayErrorContext(&e)))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| PortError::Transport(format!("Failed to read object body: {}", e)))?
            .into_bytes()
            .to_vec();
        Ok(data)
    }

    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> PortResult<()> {
        // S3 puts overwrite in place, so a same-named object is replaced.
        self.client
            .put_object()
            .bucket(bucket)
            .key(name)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| map_sdk_error("Failed to put", name, DisplayErrorContext(&e)))?;
        info!(bucket, name, "object uploaded");
        Ok(())
    }

    async fn ensure_bucket(&self, bucket: &str) -> PortResult<()> {
        if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
            debug!(bucket, "bucket exists");
            return Ok(());
        }

        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!("Bucket '{}' created successfully.", bucket);
                Ok(())
            }
            Err(e) => {
                let message = DisplayErrorContext(&e).to_string();
                if message.contains("BucketAlreadyOwnedByYou") || message.contains("BucketAlreadyExists") {
                    Ok(())
                } else {
                    Err(PortError::Transport(format!(
                        "Failed to create bucket {}: {}",
                        bucket, message
                    )))
                }
            }
        }
    }
}
