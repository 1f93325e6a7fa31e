//! Image rehosting: pull a feed's external image onto our own media host.
//!
//! Feeds reference supplier CDNs that rot, throttle, or watermark. During
//! import every image is downloaded, checked, and re-uploaded under a
//! deterministic object key, so re-importing the same feed overwrites
//! instead of accumulating copies.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use grifo_core::slug::slugify;
use grifo_core::AppConfig;

use crate::retry::retry_with_backoff;

#[derive(Debug, Error)]
pub enum RehostError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} downloading {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("{url} is not an image (content-type {content_type})")]
    NotAnImage { url: String, content_type: String },

    #[error("{url} is too large ({size_bytes} bytes, limit {limit_bytes})")]
    TooLarge {
        url: String,
        size_bytes: u64,
        limit_bytes: u64,
    },

    #[error("upload of {key} failed with status {status}")]
    UploadFailed { key: String, status: u16 },
}

/// Where an image ended up. `uploaded` is `false` when the URL passed
/// through untouched (no-op rehoster, or the image was already ours).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehostOutcome {
    pub url: String,
    pub uploaded: bool,
}

/// Moves one image to the media host and returns its new public URL.
///
/// `context` is the product name (slugified into the object key) and
/// `index` distinguishes the images of one product: 0 for the default
/// image, 1-based for variant images.
#[async_trait]
pub trait ImageRehoster: Send + Sync {
    async fn rehost(
        &self,
        source_url: &str,
        context: &str,
        index: usize,
    ) -> Result<RehostOutcome, RehostError>;
}

/// Passes URLs through unchanged. Used for dry runs and when no media
/// host is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopImageRehoster;

#[async_trait]
impl ImageRehoster for NoopImageRehoster {
    async fn rehost(
        &self,
        source_url: &str,
        _context: &str,
        _index: usize,
    ) -> Result<RehostOutcome, RehostError> {
        Ok(RehostOutcome {
            url: source_url.to_string(),
            uploaded: false,
        })
    }
}

/// Download-and-PUT rehoster against an S3-style HTTP media host.
///
/// Downloads are retried on transient failures with exponential backoff,
/// rejected when the response is not an `image/*` or exceeds `max_bytes`,
/// then uploaded to `{upload_base}/{key}` and published at
/// `{public_base}/{key}`.
pub struct HttpImageRehoster {
    client: Client,
    upload_base: String,
    public_base: String,
    max_bytes: u64,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl HttpImageRehoster {
    /// Creates a rehoster with configured timeout, `User-Agent`, and retry
    /// policy. Base URLs keep or lose their trailing slash consistently so
    /// keys join with exactly one `/`.
    ///
    /// # Errors
    ///
    /// Returns [`RehostError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        upload_base: &str,
        public_base: &str,
        max_bytes: u64,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, RehostError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            upload_base: upload_base.trim_end_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
            max_bytes,
            max_retries,
            backoff_base_secs,
        })
    }

    /// Builds a rehoster from the app config, or `None` when the media
    /// host URLs are not set (imports then keep original URLs).
    ///
    /// # Errors
    ///
    /// Returns [`RehostError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, RehostError> {
        let (Some(upload_base), Some(public_base)) =
            (config.media_upload_url.as_ref(), config.media_public_url.as_ref())
        else {
            return Ok(None);
        };
        Self::new(
            config.rehost_timeout_secs,
            &config.rehost_user_agent,
            upload_base,
            public_base,
            config.rehost_max_bytes,
            config.rehost_max_retries,
            config.rehost_retry_backoff_base_secs,
        )
        .map(Some)
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String), RehostError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RehostError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
            .unwrap_or_default();
        if !content_type.starts_with("image/") {
            return Err(RehostError::NotAnImage {
                url: url.to_string(),
                content_type,
            });
        }

        // The declared length rejects oversized bodies before the
        // transfer; the byte count after it catches lying servers.
        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(RehostError::TooLarge {
                    url: url.to_string(),
                    size_bytes: length,
                    limit_bytes: self.max_bytes,
                });
            }
        }
        let body = response.bytes().await?;
        if body.len() as u64 > self.max_bytes {
            return Err(RehostError::TooLarge {
                url: url.to_string(),
                size_bytes: body.len() as u64,
                limit_bytes: self.max_bytes,
            });
        }

        Ok((body.to_vec(), content_type))
    }

    async fn upload(
        &self,
        key: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<(), RehostError> {
        let url = format!("{}/{key}", self.upload_base);
        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RehostError::UploadFailed {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImageRehoster for HttpImageRehoster {
    async fn rehost(
        &self,
        source_url: &str,
        context: &str,
        index: usize,
    ) -> Result<RehostOutcome, RehostError> {
        let (body, content_type) =
            retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
                self.download(source_url)
            })
            .await?;

        let key = object_key(context, index, source_url, extension_for(&content_type));
        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            self.upload(&key, &content_type, body.clone())
        })
        .await?;

        Ok(RehostOutcome {
            url: format!("{}/{key}", self.public_base),
            uploaded: true,
        })
    }
}

/// Object key for a rehosted image: `{context-slug}-{index}-{hash12}.{ext}`.
///
/// The hash is over the source URL, so the same image re-imported lands on
/// the same key and overwrites rather than duplicating.
#[must_use]
pub(crate) fn object_key(
    context: &str,
    index: usize,
    source_url: &str,
    extension: &str,
) -> String {
    use sha2::{Digest, Sha256};
    let mut slug = slugify(context);
    if slug.is_empty() {
        slug = "producto".to_string();
    }
    let hash = format!("{:x}", Sha256::digest(source_url.as_bytes()));
    format!("{slug}-{index}-{}.{extension}", &hash[..12])
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/avif" => "avif",
        "image/svg+xml" => "svg",
        _ => "img",
    }
}

/// Appends `w=`/`h=` resize parameters to a hosted image URL. A plain
/// string rewrite: the media host does the actual resizing.
#[must_use]
pub fn optimized_url(hosted: &str, width: Option<u32>, height: Option<u32>) -> String {
    let mut url = hosted.to_string();
    let mut joiner = if hosted.contains('?') { '&' } else { '?' };
    if let Some(width) = width {
        url.push(joiner);
        url.push_str(&format!("w={width}"));
        joiner = '&';
    }
    if let Some(height) = height {
        url.push(joiner);
        url.push_str(&format!("h={height}"));
    }
    url
}
