use std::time::Duration;

use aws_sdk_s3::{Client, config::Region, config::Credentials, config::BehaviorVersion};
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use time::OffsetDateTime;
use tracing::info;

/// S3 caps a single DeleteObjects call at this many keys.
const DELETE_BATCH: usize = 1_000;

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        let client = Client::from_conf(config);

        info!("✅ Connected to S3 (MinIO)");

        Self {
            client,
            bucket: bucket.to_string(),
        }
    }

    /// Uploads under a fixed key; re-renders of the same job overwrite the
    /// previous object instead of accumulating copies.
    pub async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), aws_sdk_s3::Error> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await?;

        Ok(())
    }

    pub async fn presigned_url(&self, key: &str, expires: Duration) -> anyhow::Result<String> {
        let config = PresigningConfig::expires_in(expires)?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await?;

        Ok(request.uri().to_string())
    }

    pub async fn list_keys_modified_before(
        &self,
        cutoff: OffsetDateTime,
    ) -> Result<Vec<String>, aws_sdk_s3::Error> {
        let cutoff_secs = cutoff.unix_timestamp();
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let page = request.send().await?;

            for object in page.contents() {
                let old_enough = object
                    .last_modified()
                    .is_some_and(|ts| ts.secs() < cutoff_secs);
                if old_enough {
                    if let Some(key) = object.key() {
                        keys.push(key.to_string());
                    }
                }
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated() == Some(true) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    /// Deletes in chunks of at most [`DELETE_BATCH`] keys and returns how
    /// many objects the service confirmed removed.
    pub async fn delete_objects(&self, keys: &[String]) -> anyhow::Result<usize> {
        let mut deleted = 0usize;

        for chunk in keys.chunks(DELETE_BATCH) {
            let objects = chunk
                .iter()
                .map(|key| ObjectIdentifier::builder().key(key).build())
                .collect::<Result<Vec<_>, _>>()?;

            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()?;

            let result = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await?;

            deleted += chunk.len() - result.errors().len();
        }

        Ok(deleted)
    }
}
