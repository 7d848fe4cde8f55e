//! Artifact download, archive extraction and executable lookup.

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::GateConfig;
use crate::error::RuntimeError;

/// Result of a completed download.
#[derive(Debug, Clone)]
pub struct DownloadReport {
    /// Bytes written to the destination.
    pub bytes: u64,
    /// Hex-encoded SHA-256 of the content.
    pub sha256: String,
}

/// HTTP downloader with a fixed retry policy.
pub struct Downloader {
    client: reqwest::Client,
    attempts: u32,
    retry_delay: Duration,
    expected_sha256: Option<String>,
}

impl Downloader {
    /// Create a downloader making at most `attempts` requests, `retry_delay` apart.
    pub fn new(attempts: u32, retry_delay: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            attempts: attempts.max(1),
            retry_delay,
            expected_sha256: None,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        let downloader = Self::new(config.download_attempts, config.download_retry_delay);
        match &config.release_sha256 {
            Some(digest) => downloader.with_checksum(digest.clone()),
            None => downloader,
        }
    }

    /// Verify downloads against a hex SHA-256 digest.
    pub fn with_checksum(mut self, sha256: impl Into<String>) -> Self {
        self.expected_sha256 = Some(sha256.into().to_lowercase());
        self
    }

    /// Download `url` to `dest`, overwriting any existing file.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<DownloadReport, RuntimeError> {
        let response = self.fetch(url).await?;

        info!("Downloading {} to {:?}", url, dest);

        // Create progress bar
        let pb = match response.content_length() {
            Some(size) => {
                let pb = ProgressBar::new(size);
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                ) {
                    pb.set_style(style.progress_chars("#>-"));
                }
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {bytes} downloaded")
                {
                    pb.set_style(style);
                }
                pb
            }
        };

        let mut file = File::create(dest)?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| RuntimeError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk)?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }
        file.flush()?;

        pb.finish_with_message("Download complete");

        let actual = hex::encode(hasher.finalize());

        if let Some(expected) = &self.expected_sha256 {
            if actual != *expected {
                // Remove corrupted file
                drop(file);
                let _ = fs::remove_file(dest);
                return Err(RuntimeError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!("Checksum verified: {}", actual);
        }

        info!("Downloaded {} bytes from {}", downloaded, url);
        Ok(DownloadReport {
            bytes: downloaded,
            sha256: actual,
        })
    }

    /// Issue the GET, retrying on transport errors and non-200 statuses.
    async fn fetch(&self, url: &str) -> Result<reqwest::Response, RuntimeError> {
        let mut last_failure = String::new();

        for attempt in 1..=self.attempts {
            match self.client.get(url).send().await {
                Ok(response) if response.status() == reqwest::StatusCode::OK => {
                    return Ok(response)
                }
                Ok(response) => last_failure = format!("HTTP {}", response.status()),
                Err(e) => last_failure = e.to_string(),
            }

            warn!(
                "Download attempt {}/{} for {} failed: {}",
                attempt, self.attempts, url, last_failure
            );

            if attempt < self.attempts {
                sleep(self.retry_delay).await;
            }
        }

        Err(RuntimeError::Download {
            url: url.to_string(),
            reason: last_failure,
        })
    }
}

/// Extract an archive into `dest_dir`, returning the number of files written.
///
/// `.tgz`/`.tar.gz` archives go through the system `tar`; anything else is
/// treated as zip. A failure leaves already extracted files in place.
pub fn extract(archive: &Path, dest_dir: &Path) -> Result<usize, RuntimeError> {
    let name = archive.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".tgz") || name.ends_with(".tar.gz") {
        return extract_tarball(archive, dest_dir);
    }
    extract_zip(archive, dest_dir)
}

fn extraction_error(archive: &Path, reason: impl ToString) -> RuntimeError {
    RuntimeError::Extraction {
        archive: archive.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn extract_zip(archive: &Path, dest_dir: &Path) -> Result<usize, RuntimeError> {
    fs::create_dir_all(dest_dir).map_err(|e| extraction_error(archive, e))?;

    let file = File::open(archive).map_err(|e| extraction_error(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| extraction_error(archive, e))?;
    let mut written = 0;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| extraction_error(archive, e))?;

        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!("Skipping archive entry outside destination: {}", entry.name());
            continue;
        };
        let out_path = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| extraction_error(archive, e))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| extraction_error(archive, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| extraction_error(archive, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| extraction_error(archive, e))?;
        written += 1;
    }

    debug!("Extracted {} files from {:?}", written, archive);
    Ok(written)
}

#[cfg(not(target_os = "windows"))]
fn extract_tarball(archive: &Path, dest_dir: &Path) -> Result<usize, RuntimeError> {
    fs::create_dir_all(dest_dir).map_err(|e| extraction_error(archive, e))?;

    let output = std::process::Command::new("tar")
        .arg("xzf")
        .arg(archive)
        .arg("-C")
        .arg(dest_dir)
        .output()
        .map_err(|e| extraction_error(archive, format!("failed to run tar: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(extraction_error(archive, format!("tar failed: {}", stderr.trim())));
    }

    let written = WalkDir::new(dest_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count();
    Ok(written)
}

#[cfg(target_os = "windows")]
fn extract_tarball(archive: &Path, _dest_dir: &Path) -> Result<usize, RuntimeError> {
    Err(extraction_error(archive, "tar.gz extraction is not supported on Windows"))
}

/// Find a file under `root` by base name, ignoring ASCII case.
///
/// Returns the first match in traversal order.
pub fn locate(root: &Path, filename: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .find(|e| e.file_name().to_string_lossy().eq_ignore_ascii_case(filename))
        .map(|e| e.into_path())
}

/// Mark a file as executable. No-op on Windows.
pub fn mark_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;
    use zip::write::FileOptions;

    const PAYLOAD: &[u8] = b"ollama release payload";

    /// Stub release server that fails the first `failures` requests.
    async fn flaky_server(failures: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/release.zip",
                get(move |State(hits): State<Arc<AtomicUsize>>| async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        Err(StatusCode::SERVICE_UNAVAILABLE)
                    } else {
                        Ok(PAYLOAD)
                    }
                }),
            )
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/release.zip", addr), hits)
    }

    fn write_zip(path: &Path, entries: &[(&str, Option<&[u8]>)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, content) in entries {
            match content {
                Some(bytes) => {
                    writer.start_file(*name, FileOptions::default()).unwrap();
                    writer.write_all(bytes).unwrap();
                }
                None => writer.add_directory(*name, FileOptions::default()).unwrap(),
            }
        }
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let (url, hits) = flaky_server(0).await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("release.zip");
        fs::write(&dest, b"stale content that is longer than the payload").unwrap();

        let report = Downloader::new(3, Duration::from_millis(10))
            .download(&url, &dest)
            .await
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), PAYLOAD);
        assert_eq!(report.bytes, PAYLOAD.len() as u64);
        assert_eq!(report.sha256, hex::encode(Sha256::digest(PAYLOAD)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_download_retries_until_success() {
        let (url, hits) = flaky_server(2).await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("release.zip");

        Downloader::new(3, Duration::from_millis(10))
            .download(&url, &dest)
            .await
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(fs::read(&dest).unwrap(), PAYLOAD);
    }

    #[tokio::test]
    async fn test_download_gives_up_after_attempts() {
        let (url, hits) = flaky_server(usize::MAX).await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("release.zip");

        let err = Downloader::new(3, Duration::from_millis(10))
            .download(&url, &dest)
            .await
            .unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        match err {
            RuntimeError::Download { reason, .. } => assert!(reason.contains("503")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_checksum_mismatch_removes_file() {
        let (url, _) = flaky_server(0).await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("release.zip");

        let err = Downloader::new(1, Duration::ZERO)
            .with_checksum("00".repeat(32))
            .download(&url, &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, RuntimeError::ChecksumMismatch { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn test_extract_nested_directories() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("runtime.zip");
        let binary: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        write_zip(
            &archive,
            &[
                ("lib/", None),
                ("lib/ollama/", None),
                ("lib/ollama/runner.so", Some(binary.as_slice())),
                ("bin/nested/deep/ollama.exe", Some(b"MZ fake exe".as_slice())),
                ("README.txt", Some(b"".as_slice())),
            ],
        );

        let dest = dir.path().join("out");
        let written = extract(&archive, &dest).unwrap();

        assert_eq!(written, 3);
        assert_eq!(fs::read(dest.join("lib/ollama/runner.so")).unwrap(), binary);
        assert_eq!(
            fs::read(dest.join("bin/nested/deep/ollama.exe")).unwrap(),
            b"MZ fake exe"
        );
        assert!(dest.join("README.txt").is_file());
    }

    #[test]
    fn test_extract_skips_escaping_entries() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("evil.zip");
        write_zip(
            &archive,
            &[
                ("../escape.txt", Some(b"nope".as_slice())),
                ("ok.txt", Some(b"fine".as_slice())),
            ],
        );

        let dest = dir.path().join("out");
        let written = extract(&archive, &dest).unwrap();

        assert_eq!(written, 1);
        assert!(!dir.path().join("escape.txt").exists());
        assert_eq!(fs::read(dest.join("ok.txt")).unwrap(), b"fine");
    }

    #[test]
    fn test_extract_invalid_archive() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip at all").unwrap();

        let err = extract(&archive, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, RuntimeError::Extraction { .. }));
    }

    #[test]
    fn test_locate_case_insensitive() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("sub").join("dir");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("Ollama.EXE"), b"exe").unwrap();
        fs::write(dir.path().join("other.txt"), b"").unwrap();

        let found = locate(dir.path(), "ollama.exe");
        assert_eq!(found, Some(nested.join("Ollama.EXE")));
    }

    #[test]
    fn test_locate_missing() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ollama.exe")).unwrap();

        // Directories with a matching name do not count.
        assert_eq!(locate(dir.path(), "ollama.exe"), None);
    }
}
