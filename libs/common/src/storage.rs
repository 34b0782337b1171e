//! S3-compatible object storage for catalog images
//!
//! Images live in a single bucket. Objects are named `<uuid><extension>` and
//! addressed by the public URL `http://<host>/<bucket>/<object>`.

use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    primitives::ByteStream,
};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};

/// Object storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// `host:port` of the S3 endpoint, also used to build public URLs
    pub host: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

impl StorageConfig {
    /// Create a new StorageConfig from environment variables
    ///
    /// # Environment Variables
    /// - `S3_ENDPOINT`: endpoint host and port (default: "localhost:9000")
    /// - `S3_BUCKET`: bucket holding the images (default: "threats")
    /// - `S3_ACCESS_KEY_ID` / `S3_SECRET_ACCESS_KEY`: static credentials
    /// - `S3_REGION`: bucket location (default: "us-east-1")
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var(name).unwrap_or_else(|_| default.to_string())
        };

        Self {
            host: var("S3_ENDPOINT", "localhost:9000"),
            bucket: var("S3_BUCKET", "threats"),
            access_key_id: var("S3_ACCESS_KEY_ID", "minioadmin"),
            secret_access_key: var("S3_SECRET_ACCESS_KEY", "minioadmin"),
            region: var("S3_REGION", "us-east-1"),
        }
    }
}

/// Image bucket client
#[derive(Clone)]
pub struct ImageStore {
    client: Client,
    host: String,
    bucket: String,
}

impl ImageStore {
    /// Build a client for the endpoint; no request is sent
    pub async fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "static",
        );

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(format!("http://{}", config.host))
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            host: config.host.clone(),
            bucket: config.bucket.clone(),
        }
    }

    /// Connect to the endpoint and make sure the bucket exists
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        let store = Self::new(config).await;
        store.ensure_bucket().await?;
        Ok(store)
    }

    async fn ensure_bucket(&self) -> StorageResult<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            info!("Using existing bucket {}", self.bucket);
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Bucket(e.to_string()))?;

        info!("Created bucket {}", self.bucket);
        Ok(())
    }

    /// Upload an image and return its public URL
    pub async fn save_image(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> StorageResult<String> {
        let key = object_name_for(file_name);
        info!("Uploading image {} ({} bytes)", key, bytes.len());

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes));
        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|e| StorageError::Upload {
            key: key.clone(),
            message: e.to_string(),
        })?;

        Ok(object_url(&self.host, &self.bucket, &key))
    }

    /// Remove the object a previously issued URL points at
    pub async fn delete_image(&self, url: &str) -> StorageResult<()> {
        let Some(key) = object_name_from_url(url) else {
            warn!("Ignoring delete for malformed image URL {:?}", url);
            return Ok(());
        };

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(())
    }
}

/// Unique object name keeping the uploaded file's extension
pub fn object_name_for(file_name: &str) -> String {
    match Path::new(file_name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

pub fn object_url(host: &str, bucket: &str, object: &str) -> String {
    format!("http://{}/{}/{}", host, bucket, object)
}

/// Last path segment of an object URL
pub fn object_name_from_url(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}
