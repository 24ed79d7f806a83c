use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder, AwsAuthorizer, AwsCredential};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore as _;
use reqwest::{Client, Method, StatusCode, Url};

use super::{ObjectStore, ObjectStoreError};

#[derive(Clone)]
pub struct S3Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// S3-compatible object store backend (MinIO, AWS) using path-style requests.
pub struct S3Store {
    inner: AmazonS3,
}

impl S3Store {
    /// Connect and make sure the bucket exists.
    pub async fn new(
        endpoint: &str,
        bucket: &str,
        region: &str,
        credentials: S3Credentials,
    ) -> Result<Self, anyhow::Error> {
        let endpoint_url = Url::parse(endpoint)?;

        create_bucket(&endpoint_url, bucket, region, &credentials).await?;

        let inner = AmazonS3Builder::new()
            .with_endpoint(endpoint)
            .with_access_key_id(&credentials.access_key)
            .with_secret_access_key(&credentials.secret_key)
            .with_bucket_name(bucket)
            .with_region(region)
            .with_virtual_hosted_style_request(false)
            .with_allow_http(endpoint_url.scheme() == "http")
            .build()?;

        Ok(Self { inner })
    }
}

/// PUT on the bucket path. 409 covers BucketAlreadyOwnedByYou / BucketAlreadyExists.
async fn create_bucket(
    endpoint: &Url,
    bucket: &str,
    region: &str,
    credentials: &S3Credentials,
) -> Result<(), anyhow::Error> {
    let url = bucket_url(endpoint, bucket)?;
    let client = Client::builder().build()?;
    let mut request = client.request(Method::PUT, url).build()?;

    let credential = AwsCredential {
        key_id: credentials.access_key.clone(),
        secret_key: credentials.secret_key.clone(),
        token: None,
    };
    AwsAuthorizer::new(&credential, "s3", region).authorize(&mut request, None);

    let resp = client.execute(request).await?;
    let status = resp.status();
    if !status.is_success() && status != StatusCode::CONFLICT {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("S3 bucket creation failed ({status}): {body}");
    }

    tracing::debug!(%bucket, "S3 bucket ready");
    Ok(())
}

fn bucket_url(endpoint: &Url, bucket: &str) -> Result<Url, anyhow::Error> {
    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("S3 endpoint cannot be a base URL: {endpoint}"))?
        .pop_if_empty()
        .push(bucket);
    Ok(url)
}

fn object_path(key: &str) -> ObjectPath {
    ObjectPath::from(key)
}

fn map_error(key: &str, e: object_store::Error) -> ObjectStoreError {
    match e {
        object_store::Error::NotFound { .. } => ObjectStoreError::NotFound(key.to_string()),
        other => ObjectStoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError> {
        self.inner
            .put(&object_path(key), data.into())
            .await
            .map_err(|e| map_error(key, e))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let result = self
            .inner
            .get(&object_path(key))
            .await
            .map_err(|e| map_error(key, e))?;
        result.bytes().await.map_err(|e| map_error(key, e))
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        match self.inner.head(&object_path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(map_error(key, e)),
        }
    }
}
