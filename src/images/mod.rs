//! Remote image hosting for book covers.

mod cloudinary;

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use bookstore_kernel::settings::{ImageProvider, ImageSettings};

pub use cloudinary::CloudinaryHost;

/// A remote host that stores uploaded images and serves them by URL.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Store `bytes` and return the public URL of the stored image.
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String>;

    /// Remove the image previously returned by [`ImageHost::upload`].
    async fn destroy(&self, url: &str) -> Result<()>;
}

/// Used when no provider is configured: uploads fail, destroys do nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledImageHost;

#[async_trait]
impl ImageHost for DisabledImageHost {
    async fn upload(&self, _bytes: Vec<u8>, filename: &str) -> Result<String> {
        bail!("image uploads are disabled, cannot store {filename}")
    }

    async fn destroy(&self, url: &str) -> Result<()> {
        tracing::debug!(%url, "image hosting disabled, nothing to destroy");
        Ok(())
    }
}

pub fn from_settings(settings: &ImageSettings) -> Result<Arc<dyn ImageHost>> {
    Ok(match settings.provider {
        ImageProvider::Disabled => Arc::new(DisabledImageHost),
        ImageProvider::Cloudinary => Arc::new(CloudinaryHost::new(settings)?),
    })
}
