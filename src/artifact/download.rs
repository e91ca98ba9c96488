//! Build artifact retrieval

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use ucb_protocol::{Build, BuildStatus};

use crate::error::{Error, Result, ValidationError};
use crate::host::{ArtifactSource, BuildFilter, CloudBuildClient};

use super::extract::ArchiveFormat;
use super::filename::artifact_filename;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Which build to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildSelector {
    Explicit { target_id: String, number: u64 },
    /// Most recent successful build of a target
    LatestSuccessful(String),
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub selector: BuildSelector,
    /// Existing directory to write into
    pub destination: PathBuf,
    /// Extract the archive into `destination` instead of keeping it
    pub unpack: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DownloadOutcome {
    pub build: Build,
    pub filename: String,
    /// Downloaded file, or the destination directory when unpacked
    pub path: PathBuf,
    pub bytes: u64,
    /// SHA-256 of the transferred bytes, hex
    pub sha256: String,
    /// Paths written by extraction, in archive order
    pub extracted: Vec<PathBuf>,
}

pub struct ArtifactRetriever {
    client: CloudBuildClient,
    source: Arc<dyn ArtifactSource>,
}

impl ArtifactRetriever {
    pub fn new(client: CloudBuildClient, source: Arc<dyn ArtifactSource>) -> Self {
        Self { client, source }
    }

    pub fn resolve(&self, selector: &BuildSelector) -> Result<Build> {
        match selector {
            BuildSelector::Explicit { target_id, number } => self.client.build_status(target_id, *number),
            BuildSelector::LatestSuccessful(target_id) => {
                let filter = BuildFilter::default().with_status(BuildStatus::Success).with_limit(1);
                self.client
                    .list_builds(target_id, &filter)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ValidationError::NoSuccessfulBuild(target_id.clone()).into())
            }
        }
    }

    pub fn download(&self, request: &DownloadRequest) -> Result<DownloadOutcome> {
        let build = self.resolve(&request.selector)?;

        if !build.status.is_success() {
            return Err(ValidationError::NotSuccessful {
                target_id: build.target_id.clone(),
                number: build.number,
                status: build.status.clone(),
            }
            .into());
        }

        let link = build.download_link().ok_or_else(|| ValidationError::MissingDownloadLink {
            target_id: build.target_id.clone(),
            number: build.number,
        })?;

        let format = if request.unpack {
            let content_type = link.content_type().unwrap_or_default();
            Some(ArchiveFormat::from_content_type(content_type).ok_or_else(|| {
                ValidationError::NotAnArchive {
                    content_type: content_type.to_ascii_lowercase(),
                }
            })?)
        } else {
            None
        };

        if !request.destination.is_dir() {
            return Err(ValidationError::NotADirectory(request.destination.clone()).into());
        }

        let filename = artifact_filename(&link.href)?;
        let href = link.href.clone();
        debug!(build = %build.key(), filename = %filename, "downloading artifact");

        let outcome = match format {
            None => {
                let path = request.destination.join(&filename);
                let mut guard = PartialFile::create(&path)?;
                let (bytes, sha256) = self.transfer(&href, guard.file(), &path)?;
                guard.keep();
                info!(path = %path.display(), bytes, "artifact saved");
                DownloadOutcome {
                    build,
                    filename,
                    path,
                    bytes,
                    sha256,
                    extracted: Vec::new(),
                }
            }
            Some(format) => {
                let mut temp = tempfile::Builder::new()
                    .prefix("ucb-")
                    .suffix(&format!("-{}", filename))
                    .tempfile()
                    .map_err(|e| Error::io(std::env::temp_dir(), e))?;
                let temp_path = temp.path().to_path_buf();
                let (bytes, sha256) = self.transfer(&href, temp.as_file_mut(), &temp_path)?;

                info!(dest = %request.destination.display(), "unpacking artifact");
                // `temp` is removed on drop whether or not extraction succeeds
                let extracted = format.extract(&temp_path, &request.destination)?;
                DownloadOutcome {
                    build,
                    filename,
                    path: request.destination.clone(),
                    bytes,
                    sha256,
                    extracted,
                }
            }
        };
        Ok(outcome)
    }

    /// Stream `href` into `out`, returning byte count and SHA-256
    fn transfer(&self, href: &str, out: &mut File, path: &Path) -> Result<(u64, String)> {
        let mut response = self.source.fetch(href)?;
        for (name, value) in &response.headers {
            debug!(header = %name, value = %value, "artifact response header");
        }
        if response.status != 200 {
            return Err(Error::Server {
                status: response.status,
                message: format!("artifact download failed with HTTP status {}", response.status),
            });
        }

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = response
                .body
                .read(&mut buffer)
                .map_err(|e| Error::Transport(e.into()))?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            out.write_all(&buffer[..n]).map_err(|e| Error::io(path, e))?;
            total += n as u64;
        }
        out.flush().map_err(|e| Error::io(path, e))?;

        Ok((total, hex::encode(hasher.finalize())))
    }
}

/// A file being written at its final path; removed on drop unless kept
struct PartialFile {
    path: PathBuf,
    file: File,
    keep: bool,
}

impl PartialFile {
    fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            keep: false,
        })
    }

    fn file(&mut self) -> &mut File {
        &mut self.file
    }

    fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = fs::remove_file(&self.path) {
                debug!(path = %self.path.display(), error = %e, "failed to remove partial download");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Method;
    use crate::mock::{MockArtifactSource, MockTransport};
    use serde_json::json;
    use tempfile::TempDir;

    const HREF: &str = "https://cdn.example.com/ios/3/Game.ipa";

    fn retriever(mock: &Arc<MockTransport>, source: &Arc<MockArtifactSource>) -> ArtifactRetriever {
        ArtifactRetriever::new(CloudBuildClient::new(mock.clone()), source.clone())
    }

    fn script_build(mock: &MockTransport, status: &str, link: Option<serde_json::Value>) {
        let mut body = json!({"build": 3, "buildTargetId": "ios", "buildStatus": status});
        if let Some(link) = link {
            body["links"] = json!({ "download_primary": link });
        }
        mock.respond_json(Method::Get, "buildtargets/ios/builds/3", 200, body);
    }

    fn request(dest: &Path, unpack: bool) -> DownloadRequest {
        DownloadRequest {
            selector: BuildSelector::Explicit {
                target_id: "ios".to_string(),
                number: 3,
            },
            destination: dest.to_path_buf(),
            unpack,
        }
    }

    #[test]
    fn test_plain_download() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockTransport::new());
        let source = Arc::new(MockArtifactSource::new());
        script_build(&mock, "success", Some(json!({"href": HREF, "meta": {"type": "IPA"}})));
        source.serve(HREF, 200, b"ipa-bytes".to_vec());

        let outcome = retriever(&mock, &source).download(&request(dir.path(), false)).unwrap();
        assert_eq!(outcome.filename, "Game.ipa");
        assert_eq!(outcome.bytes, 9);
        assert_eq!(fs::read(dir.path().join("Game.ipa")).unwrap(), b"ipa-bytes");
        assert_eq!(outcome.sha256, hex::encode(Sha256::digest(b"ipa-bytes")));
    }

    #[test]
    fn test_unsuccessful_build_rejected() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockTransport::new());
        let source = Arc::new(MockArtifactSource::new());
        script_build(&mock, "failure", Some(json!({"href": HREF})));

        let err = retriever(&mock, &source).download(&request(dir.path(), false)).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::NotSuccessful { .. })));
        assert_eq!(source.fetch_count(), 0);
    }

    #[test]
    fn test_missing_link_rejected() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockTransport::new());
        let source = Arc::new(MockArtifactSource::new());
        script_build(&mock, "success", None);

        let err = retriever(&mock, &source).download(&request(dir.path(), false)).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::MissingDownloadLink { .. })));
    }

    #[test]
    fn test_destination_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();
        let mock = Arc::new(MockTransport::new());
        let source = Arc::new(MockArtifactSource::new());
        script_build(&mock, "success", Some(json!({"href": HREF})));

        let err = retriever(&mock, &source).download(&request(&file, false)).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::NotADirectory(_))));
        assert_eq!(source.fetch_count(), 0);
    }

    #[test]
    fn test_http_error_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockTransport::new());
        let source = Arc::new(MockArtifactSource::new());
        script_build(&mock, "success", Some(json!({"href": HREF})));
        source.serve(HREF, 403, b"denied".to_vec());

        let err = retriever(&mock, &source).download(&request(dir.path(), false)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Server);
        assert!(!dir.path().join("Game.ipa").exists());
    }

    #[test]
    fn test_latest_successful_none() {
        let mock = Arc::new(MockTransport::new());
        let source = Arc::new(MockArtifactSource::new());
        mock.respond_json(Method::Get, "buildtargets/ios/builds", 200, json!([]));

        let err = retriever(&mock, &source)
            .resolve(&BuildSelector::LatestSuccessful("ios".to_string()))
            .unwrap_err();
        assert_eq!(err.to_string(), "No successful build for target ios");
        assert_eq!(mock.calls()[0].query_value("buildStatus"), Some("success"));
    }
}
