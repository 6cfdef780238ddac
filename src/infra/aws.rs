use async_trait::async_trait;
use aws_config::default_provider::credentials::DefaultCredentialsChain;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::ProvideCredentials;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::{config::Region, Client, Config as S3Config};
use std::sync::Arc;
use tokio_stream::StreamExt;

use crate::domain::{
    bridge::BridgeReader,
    provider::{
        DeleteResult, DownloadResult, ProviderError, StorageProvider, TransferArguments,
        UploadResult, DEFAULT_CONTENT_TYPE,
    },
    yaml_config::ResolvedBucketConfig,
};

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket_name: String,
    prefix: String,
}

impl S3Storage {
    /// Create S3Storage from a resolved bucket configuration
    pub async fn from_resolved_bucket(
        bucket_config: &ResolvedBucketConfig,
    ) -> Result<Self, ProviderError> {
        // Resolve region
        let region_chain = RegionProviderChain::first_try(
            bucket_config.region.as_ref().map(|r| Region::new(r.clone())),
        )
        .or_default_provider();

        let region = region_chain.region().await.ok_or_else(|| {
            tracing::error!(
                "AWS_REGION must be set for bucket '{}'",
                bucket_config.bucket_name
            );
            ProviderError::OperationFailed("no AWS region configured".to_string())
        })?;

        // Build credentials provider
        let credentials_provider: Arc<dyn ProvideCredentials> =
            match (&bucket_config.access_key_id, &bucket_config.secret_access_key) {
                (Some(access_key_id), Some(secret_access_key)) => Arc::new(Credentials::new(
                    access_key_id,
                    secret_access_key,
                    bucket_config.session_token.clone(),
                    None,
                    "file-gateway",
                )),
                _ => Arc::new(
                    DefaultCredentialsChain::builder()
                        .region(region.clone())
                        .build()
                        .await,
                ),
            };

        let mut s3_config_builder = S3Config::builder()
            .behavior_version_latest()
            .region(region)
            .credentials_provider(credentials_provider)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(std::time::Duration::from_secs(bucket_config.timeout))
                    .build(),
            );

        // Configure for custom S3-compatible endpoints (MinIO, Hetzner, etc.)
        if let Some(endpoint_url) = &bucket_config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style addressing if configured (required for MinIO and some S3-compatible services)
        if bucket_config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client,
            bucket_name: bucket_config.bucket_name.clone(),
            prefix: bucket_config.prefix.clone(),
        })
    }

    /// Build the object key for a request path
    fn object_key(prefix: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", prefix, path)
        }
    }

    fn key(&self, args: &TransferArguments) -> String {
        Self::object_key(&self.prefix, &args.path)
    }

    async fn exists(&self, key: &str) -> Result<bool, ProviderError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match e.into_service_error() {
                HeadObjectError::NotFound(_) => Ok(false),
                other => {
                    tracing::error!("S3 head_object failed: {:?}", other);
                    Err(ProviderError::OperationFailed(other.to_string()))
                }
            },
        }
    }

    /// Test bucket connectivity by performing a list_objects_v2 operation
    /// This verifies that credentials are valid and the bucket is accessible
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        tracing::debug!("Testing connection to bucket: {}", self.bucket_name);

        self.client
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .prefix(&self.prefix)
            .max_keys(1) // Only need to list one object to verify connectivity
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to connect to bucket '{}': {:?}",
                    self.bucket_name,
                    e
                );
                ProviderError::OperationFailed(format!(
                    "bucket '{}' is not accessible",
                    self.bucket_name
                ))
            })?;

        tracing::info!("Successfully connected to bucket: {}", self.bucket_name);
        Ok(())
    }
}

#[async_trait]
impl StorageProvider for S3Storage {
    async fn download(&self, args: &TransferArguments) -> Result<DownloadResult, ProviderError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(self.key(args))
            .send()
            .await
            .map_err(|e| match e.into_service_error() {
                GetObjectError::NoSuchKey(_) => ProviderError::NotFound,
                other => {
                    tracing::error!("S3 get_object failed: {:?}", other);
                    ProviderError::OperationFailed(other.to_string())
                }
            })?;

        let content_type = result
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        // Direct streaming - no buffering
        Ok(DownloadResult {
            content_type,
            content: Box::new(result.body.into_async_read()),
        })
    }

    async fn upload(
        &self,
        source: BridgeReader,
        args: &TransferArguments,
    ) -> Result<UploadResult, ProviderError> {
        let key = self.key(args);
        let existed = self.exists(&key).await?;

        // The bridge reader is Sync, so it can back the request body directly.
        // An aborted bridge ends in an error frame and the PUT is never committed.
        let frame_stream = source.map(|result| {
            result
                .map(hyper::body::Frame::data)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        });
        let stream_body = http_body_util::StreamBody::new(frame_stream);
        let boxed_body = http_body_util::combinators::BoxBody::new(stream_body);
        let byte_stream = aws_sdk_s3::primitives::ByteStream::from_body_1_x(boxed_body);

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .body(byte_stream);
        if let Some(length) = args.content_length.and_then(|l| i64::try_from(l).ok()) {
            request = request.content_length(length);
        }

        let output = request.send().await.map_err(|e| {
            tracing::error!("S3 put_object failed: {:?}", e);
            ProviderError::OperationFailed(e.to_string())
        })?;

        Ok(UploadResult {
            status: if existed { 200 } else { 201 },
            metadata: Some(serde_json::json!({
                "path": args.path,
                "key": key,
                "etag": output.e_tag(),
            })),
        })
    }

    async fn delete(&self, args: &TransferArguments) -> Result<DeleteResult, ProviderError> {
        let key = self.key(args);
        if !self.exists(&key).await? {
            return Err(ProviderError::NotFound);
        }

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("S3 delete_object failed: {:?}", e);
                ProviderError::OperationFailed(e.to_string())
            })?;

        Ok(DeleteResult { status: 204 })
    }
}
