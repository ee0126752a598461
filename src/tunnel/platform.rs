//! Which `cloudflared` release asset runs on this machine.

use crate::tunnel::TunnelError;

/// Where GitHub serves the newest `cloudflared` assets.
pub const RELEASES_URL: &str = "https://github.com/cloudflare/cloudflared/releases/latest/download";

/// One downloadable `cloudflared` build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// File name of the release asset.
    pub asset: &'static str,
    /// File name of the executable once the asset is on disk.
    pub binary: &'static str,
    /// Only an x86_64 macOS build exists; Apple silicon runs it under Rosetta.
    pub needs_x86_64_translation: bool,
}

impl Release {
    /// The release for the running OS and CPU.
    pub fn current() -> Result<Self, TunnelError> {
        Self::for_platform(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// The release for an `std::env::consts::{OS, ARCH}` pair.
    pub fn for_platform(os: &str, arch: &str) -> Result<Self, TunnelError> {
        let asset = match (os, arch) {
            ("windows", "x86_64") => "cloudflared-windows-amd64.exe",
            ("windows", "x86") => "cloudflared-windows-386.exe",
            ("linux", "x86_64") => "cloudflared-linux-amd64",
            ("linux", "x86") => "cloudflared-linux-386",
            ("linux", "arm") => "cloudflared-linux-arm",
            ("linux", "aarch64") => "cloudflared-linux-arm64",
            ("macos", "x86_64" | "aarch64") => {
                return Ok(Self {
                    asset: "cloudflared-darwin-amd64.tgz",
                    binary: "cloudflared",
                    needs_x86_64_translation: arch == "aarch64",
                })
            }
            _ => {
                return Err(TunnelError::Unsupported {
                    os: os.to_string(),
                    arch: arch.to_string(),
                })
            }
        };

        Ok(Self {
            asset,
            binary: asset,
            needs_x86_64_translation: false,
        })
    }

    /// Download URL of the asset under `base`.
    pub fn url(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self.asset)
    }

    /// Whether the asset is a gzipped tarball rather than the executable itself.
    pub fn is_archive(&self) -> bool {
        self.asset.ends_with(".tgz")
    }
}
