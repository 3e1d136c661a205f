use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bookstore_kernel::settings::ImageSettings;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::ImageHost;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// Cloudinary upload API client using signed requests.
pub struct CloudinaryHost {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_secret: String,
    folder: String,
}

impl std::fmt::Debug for CloudinaryHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryHost")
            .field("endpoint", &self.endpoint)
            .field("folder", &self.folder)
            .finish_non_exhaustive()
    }
}

impl CloudinaryHost {
    pub fn new(settings: &ImageSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/{}/image",
                settings.api_base.trim_end_matches('/'),
                settings.cloud_name
            ),
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
            folder: settings.folder.clone(),
        })
    }

    /// Signature over the alphabetically sorted `params`, followed by the secret.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut params = params.to_vec();
        params.sort_by(|a, b| a.0.cmp(b.0));
        let joined = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }
}

#[async_trait]
impl ImageHost for CloudinaryHost {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<String> {
        let timestamp = Self::timestamp();
        let signature = self.sign(&[("folder", &self.folder), ("timestamp", &timestamp)]);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
            )
            .text("api_key", self.api_key.clone())
            .text("folder", self.folder.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .client
            .post(format!("{}/upload", self.endpoint))
            .multipart(form)
            .send()
            .await
            .context("image upload request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("image upload rejected with {status}: {body}");
        }

        let body: UploadResponse = response
            .json()
            .await
            .context("invalid image upload response")?;
        tracing::info!(url = %body.secure_url, "image uploaded");
        Ok(body.secure_url)
    }

    async fn destroy(&self, url: &str) -> Result<()> {
        let Some(public_id) = public_id_from_url(url) else {
            bail!("cannot derive a public id from {url}");
        };

        let timestamp = Self::timestamp();
        let signature = self.sign(&[("public_id", &public_id), ("timestamp", &timestamp)]);
        let params = [
            ("public_id", public_id.as_str()),
            ("api_key", self.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature_algorithm", "sha256"),
            ("signature", signature.as_str()),
        ];

        let response = self
            .client
            .post(format!("{}/destroy", self.endpoint))
            .form(&params)
            .send()
            .await
            .context("image destroy request failed")?;

        if !response.status().is_success() {
            bail!("image destroy rejected with {}", response.status());
        }

        let body: DestroyResponse = response
            .json()
            .await
            .context("invalid image destroy response")?;
        tracing::info!(%public_id, result = %body.result, "image destroyed");
        Ok(())
    }
}

/// Public id of a hosted image: the path after `/upload/`, without the
/// version segment and the file extension.
///
/// `https://res.cloudinary.com/demo/image/upload/v1712/bookstore/cover.jpg`
/// yields `bookstore/cover`.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let (_, path) = url.split_once("/upload/")?;
    let path = match path.split_once('/') {
        Some((version, rest))
            if version.len() > 1
                && version.starts_with('v')
                && version[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            rest
        }
        _ => path,
    };
    let id = match path.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => path,
    };
    (!id.is_empty()).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> CloudinaryHost {
        CloudinaryHost::new(&ImageSettings {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            ..ImageSettings::default()
        })
        .unwrap()
    }

    #[test]
    fn public_id_strips_version_and_extension() {
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/v1712/bookstore/cover.jpg")
                .as_deref(),
            Some("bookstore/cover")
        );
        assert_eq!(
            public_id_from_url("https://res.cloudinary.com/demo/image/upload/cover.png").as_deref(),
            Some("cover")
        );
        assert_eq!(public_id_from_url("https://example.com/cover.png"), None);
    }

    #[test]
    fn signature_is_order_independent() {
        let host = host();
        let a = host.sign(&[("timestamp", "1"), ("folder", "bookstore")]);
        let b = host.sign(&[("folder", "bookstore"), ("timestamp", "1")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn endpoint_includes_cloud_name() {
        assert_eq!(
            host().endpoint,
            "https://api.cloudinary.com/v1_1/demo/image"
        );
    }

    #[test]
    fn debug_hides_credentials() {
        let debug = format!("{:?}", host());
        assert!(!debug.contains("secret"));
    }
}
