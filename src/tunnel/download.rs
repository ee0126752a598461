//! Fetching and unpacking the `cloudflared` executable.
//!
//! # Design Decisions
//! - Assets are cached in a directory (the OS temp dir in production) and
//!   reused across runs; a cached binary is asked to `update` itself in the
//!   background instead of being downloaded again
//! - Downloads stream to disk chunk by chunk

use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::tunnel::platform::{Release, RELEASES_URL};
use crate::tunnel::TunnelError;

/// Puts a runnable `cloudflared` into a directory.
pub struct Installer {
    client: reqwest::Client,
    base_url: String,
    dir: PathBuf,
}

impl Installer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, TunnelError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("forward-proxy/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: RELEASES_URL.to_string(),
            dir: dir.into(),
        })
    }

    /// Download assets from `base_url` instead of GitHub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make sure `release` is runnable from the cache directory and return
    /// the path of its executable.
    pub async fn ensure(&self, release: &Release) -> Result<PathBuf, TunnelError> {
        let executable = self.dir.join(release.binary);

        if executable.exists() {
            tracing::debug!(executable = %executable.display(), "Using cached cloudflared");
            make_executable(&executable)?;
            spawn_self_update(&executable);
            return Ok(executable);
        }

        let asset = self.dir.join(release.asset);
        self.fetch(&release.url(&self.base_url), &asset).await?;

        if release.is_archive() {
            let dir = self.dir.clone();
            tokio::task::spawn_blocking(move || unpack(&asset, &dir))
                .await
                .map_err(|e| TunnelError::Io {
                    path: self.dir.clone(),
                    source: std::io::Error::other(e),
                })??;
        }

        make_executable(&executable)?;
        Ok(executable)
    }

    async fn fetch(&self, url: &str, destination: &Path) -> Result<(), TunnelError> {
        let download_failed = |source| TunnelError::Download {
            url: url.to_string(),
            source,
        };
        let io_failed = |source| TunnelError::Io {
            path: destination.to_path_buf(),
            source,
        };

        tracing::info!(url, "Downloading cloudflared");
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(download_failed)?;

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(io_failed)?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await.map_err(download_failed)? {
            file.write_all(&chunk).await.map_err(io_failed)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(io_failed)?;

        tracing::debug!(path = %destination.display(), bytes = written, "Download complete");
        Ok(())
    }
}

fn unpack(archive: &Path, into: &Path) -> Result<(), TunnelError> {
    let io_failed = |source| TunnelError::Io {
        path: archive.to_path_buf(),
        source,
    };

    let file = std::fs::File::open(archive).map_err(io_failed)?;
    tar::Archive::new(GzDecoder::new(file))
        .unpack(into)
        .map_err(io_failed)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), TunnelError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|source| {
        TunnelError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), TunnelError> {
    Ok(())
}

/// Runs `cloudflared update` detached; a failed update leaves the cached binary in use.
fn spawn_self_update(executable: &Path) {
    let spawned = tokio::process::Command::new(executable)
        .arg("update")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    if let Err(e) = spawned {
        tracing::warn!(executable = %executable.display(), error = %e, "cloudflared update failed to start");
    }
}
