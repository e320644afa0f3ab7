//! Transfer seam and the HTTP implementation.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{DownloadError, Result};

/// Copies a remote file to a local path
///
/// Implementations must only create `destination` once the whole file has been
/// received, so that an existing destination always means a complete download.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Fetch `url` into `destination`
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Streams a `GET` response into `<destination>.part` and renames it into place
#[derive(Clone)]
pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    /// Create a transfer client
    ///
    /// No overall request timeout is set; the coordinator bounds each transfer.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    async fn stream_to(&self, url: &str, part: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let mut file = tokio::fs::File::create(part).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part = part_path(destination);
        let written = match self.stream_to(url, &part).await {
            Ok(written) => written,
            Err(e) => {
                tokio::fs::remove_file(&part).await.ok();
                return Err(e);
            }
        };
        tokio::fs::rename(&part, destination).await?;

        tracing::debug!(
            url = %url,
            path = %destination.display(),
            bytes = written,
            "Transfer complete"
        );
        Ok(())
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn body_is_written_to_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/episode.mp3"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64 * 1024]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("2024-01-22.mp3");
        let transfer = HttpTransfer::new("kfdl-test").unwrap();

        transfer
            .fetch(&format!("{}/episode.mp3", server.uri()), &destination)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&destination).unwrap().len(), 64 * 1024);
        assert!(!dir.path().join("2024-01-22.mp3.part").exists());
    }

    #[tokio::test]
    async fn error_status_leaves_no_files() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("2024-01-22.mp3");
        let transfer = HttpTransfer::new("kfdl-test").unwrap();

        let err = transfer
            .fetch(&format!("{}/missing.mp3", server.uri()), &destination)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Download(DownloadError::HttpStatus { status: 404, .. })
        ));
        assert!(!destination.exists());
        assert!(!dir.path().join("2024-01-22.mp3.part").exists());
    }

    #[tokio::test]
    async fn missing_working_directory_is_created() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("podcasts").join("2024-01-22.mp3");
        let transfer = HttpTransfer::new("kfdl-test").unwrap();

        transfer
            .fetch(&format!("{}/a.mp3", server.uri()), &destination)
            .await
            .unwrap();

        assert!(destination.exists());
    }
}
