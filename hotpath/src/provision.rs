//! Profiler distribution provisioning.
//!
//! Downloads the async-profiler release archive for the host platform into a
//! per-user cache, validates and extracts it, and maintains a `current`
//! symlink so later sessions skip the network entirely. Download transports
//! are tried in order; the in-process HTTP client first, the system `curl`
//! as a fallback for hosts where direct TLS is awkward (proxies, custom CA
//! bundles).

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::Context as _;
use flate2::read::GzDecoder;

use crate::domain::ProvisionError;

/// Profiler release the session provisions. Bump deliberately: event names
/// (`nativemem`, `ctimer`) and output formats (`heatmap`) are version-gated.
pub const TOOL_VERSION: &str = "4.0";

/// Smallest plausible release archive. Real ones are tens of megabytes; a
/// response under this size is a truncation or an HTML error page.
/// Override with `HOTPATH_MIN_ARCHIVE_BYTES` when testing against mirrors.
pub const MIN_ARCHIVE_BYTES: u64 = 1_000_000;

// ============================================================================
// Platform detection
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformTag {
    LinuxX64,
    LinuxArm64,
    MacOs,
}

impl PlatformTag {
    /// # Errors
    ///
    /// `UnsupportedPlatform` on any os/arch pair without a published archive.
    pub fn detect() -> Result<Self, ProvisionError> {
        match (env::consts::OS, env::consts::ARCH) {
            ("linux", "x86_64") => Ok(Self::LinuxX64),
            ("linux", "aarch64") => Ok(Self::LinuxArm64),
            ("macos", _) => Ok(Self::MacOs),
            (os, arch) => Err(ProvisionError::UnsupportedPlatform { os, arch }),
        }
    }

    /// Tag as it appears in release artifact names.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LinuxX64 => "linux-x64",
            Self::LinuxArm64 => "linux-arm64",
            Self::MacOs => "macos",
        }
    }

    pub fn archive_ext(self) -> &'static str {
        match self {
            Self::LinuxX64 | Self::LinuxArm64 => "tar.gz",
            Self::MacOs => "zip",
        }
    }

    /// Whether perf-events kernel stacks are available. Off-platform samplers
    /// must pass `--all-user` or switch to timer-based events.
    pub fn supports_kernel_sampling(self) -> bool {
        !matches!(self, Self::MacOs)
    }
}

impl fmt::Display for PlatformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn release_url(version: &str, platform: PlatformTag) -> String {
    format!(
        "https://github.com/async-profiler/async-profiler/releases/download/v{version}/async-profiler-{version}-{}.{}",
        platform.as_str(),
        platform.archive_ext()
    )
}

/// Cache root: `HOTPATH_CACHE_DIR`, else XDG cache, else `~/.cache/hotpath`.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = env::var("HOTPATH_CACHE_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    if let Ok(xdg) = env::var("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return Path::new(&xdg).join("hotpath");
        }
    }
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Path::new(&home).join(".cache").join("hotpath");
        }
    }
    PathBuf::from(".hotpath-cache")
}

fn min_archive_bytes_from_env() -> u64 {
    env::var("HOTPATH_MIN_ARCHIVE_BYTES")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(MIN_ARCHIVE_BYTES)
}

// ============================================================================
// Download transports
// ============================================================================

pub trait Transport {
    fn name(&self) -> &'static str;

    /// Cheap usability probe. Unusable transports are skipped; if none is
    /// usable the provisioner reports all of them at once.
    fn available(&self) -> bool;

    /// Downloads `url` to `dest`, returning the byte count.
    fn fetch(&self, url: &str, dest: &Path) -> anyhow::Result<u64>;
}

/// In-process HTTP client.
pub struct HttpTransport;

impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn available(&self) -> bool {
        true
    }

    fn fetch(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        let response = ureq::get(url).call().context("request failed")?;
        let mut reader = response.into_reader();
        let mut file = fs::File::create(dest)?;
        let bytes = io::copy(&mut reader, &mut file)?;
        Ok(bytes)
    }
}

/// System `curl`, which picks up proxy settings and CA bundles the
/// in-process client does not know about.
pub struct CurlTransport;

impl Transport for CurlTransport {
    fn name(&self) -> &'static str {
        "curl"
    }

    fn available(&self) -> bool {
        Command::new("curl")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn fetch(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        let status = Command::new("curl")
            .args(["-fsSL", "--retry", "2", "-o"])
            .arg(dest)
            .arg(url)
            .status()
            .context("could not spawn curl")?;
        anyhow::ensure!(status.success(), "curl exited with {status}");
        Ok(fs::metadata(dest)?.len())
    }
}

// ============================================================================
// Provisioner
// ============================================================================

/// A usable profiler installation under the cache directory.
#[derive(Debug, Clone)]
pub struct ToolInstallation {
    pub platform: PlatformTag,
    pub version: String,
    pub install_root: PathBuf,
    /// Stable entry point: `install_root/current`, a symlink to the
    /// extracted distribution.
    pub current: PathBuf,
    pub source_url: String,
    /// True when the archive was downloaded and size-checked in this call;
    /// false when an existing installation was reused.
    pub verified: bool,
}

impl ToolInstallation {
    pub fn asprof(&self) -> PathBuf {
        self.current.join("bin").join("asprof")
    }

    pub fn jfrconv(&self) -> PathBuf {
        self.current.join("bin").join("jfrconv")
    }
}

pub struct Provisioner {
    install_root: PathBuf,
    transports: Vec<Box<dyn Transport>>,
    min_archive_bytes: u64,
}

impl Provisioner {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            transports: vec![Box::new(HttpTransport), Box::new(CurlTransport)],
            min_archive_bytes: min_archive_bytes_from_env(),
        }
    }

    #[must_use]
    pub fn with_transports(mut self, transports: Vec<Box<dyn Transport>>) -> Self {
        self.transports = transports;
        self
    }

    #[must_use]
    pub fn with_min_archive_bytes(mut self, min: u64) -> Self {
        self.min_archive_bytes = min;
        self
    }

    /// Returns a ready installation, downloading and extracting only when the
    /// `current` pointer is missing or no longer resolves to a launcher.
    ///
    /// # Errors
    ///
    /// Any [`ProvisionError`]; partial downloads are removed before returning.
    pub fn ensure_installed(
        &self,
        platform: PlatformTag,
        version: &str,
    ) -> Result<ToolInstallation, ProvisionError> {
        fs::create_dir_all(&self.install_root)?;
        let current = self.install_root.join("current");
        let url = release_url(version, platform);

        if current.join("bin").join("asprof").is_file() {
            log::debug!("reusing profiler installation at {}", current.display());
            return Ok(self.installation(platform, version, &url, false));
        }

        log::info!("installing async-profiler {version} for {platform}");
        let archive = self
            .install_root
            .join(format!("async-profiler-{version}-{platform}.{}.part", platform.archive_ext()));
        let fetched = self.download(&url, &archive)?;

        if fetched < self.min_archive_bytes {
            let _ = fs::remove_file(&archive);
            return Err(ProvisionError::DownloadFailed {
                url,
                reason: format!(
                    "archive is {fetched} bytes, expected at least {} (truncated download or an error page)",
                    self.min_archive_bytes
                ),
            });
        }

        let dist = match self.extract(&archive, platform, version) {
            Ok(dist) => dist,
            Err(err) => {
                let _ = fs::remove_file(&archive);
                return Err(err);
            }
        };
        let _ = fs::remove_file(&archive);

        if fs::symlink_metadata(&current).is_ok() {
            fs::remove_file(&current)?;
        }
        symlink(&dist, &current)?;
        log::info!("profiler ready at {}", current.display());

        Ok(self.installation(platform, version, &url, true))
    }

    fn installation(
        &self,
        platform: PlatformTag,
        version: &str,
        url: &str,
        verified: bool,
    ) -> ToolInstallation {
        ToolInstallation {
            platform,
            version: version.to_string(),
            install_root: self.install_root.clone(),
            current: self.install_root.join("current"),
            source_url: url.to_string(),
            verified,
        }
    }

    /// Tries each transport in order, keeping one line per failure so the
    /// final error names everything that was attempted.
    fn download(&self, url: &str, dest: &Path) -> Result<u64, ProvisionError> {
        let mut attempts = Vec::new();
        let mut any_usable = false;
        for transport in &self.transports {
            if !transport.available() {
                attempts.push(format!("{} (unavailable)", transport.name()));
                continue;
            }
            any_usable = true;
            log::info!("downloading {url} via {}", transport.name());
            match transport.fetch(url, dest) {
                Ok(bytes) => return Ok(bytes),
                Err(err) => {
                    let _ = fs::remove_file(dest);
                    log::warn!("{} transport failed: {err:#}", transport.name());
                    attempts.push(format!("{}: {err:#}", transport.name()));
                }
            }
        }
        if any_usable {
            Err(ProvisionError::DownloadFailed {
                url: url.to_string(),
                reason: attempts.join("; "),
            })
        } else {
            Err(ProvisionError::NoTransportAvailable {
                tried: attempts.join(", "),
            })
        }
    }

    fn extract(
        &self,
        archive: &Path,
        platform: PlatformTag,
        version: &str,
    ) -> Result<PathBuf, ProvisionError> {
        let failed = |reason: String| ProvisionError::ExtractionFailed {
            archive: archive.to_path_buf(),
            reason,
        };

        match platform.archive_ext() {
            "zip" => {
                let file = fs::File::open(archive)?;
                let mut zip = zip::ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;
                zip.extract(&self.install_root)
                    .map_err(|e| failed(e.to_string()))?;
            }
            _ => {
                let file = fs::File::open(archive)?;
                let mut tarball = tar::Archive::new(GzDecoder::new(file));
                tarball
                    .unpack(&self.install_root)
                    .map_err(|e| failed(e.to_string()))?;
            }
        }

        let expected = self
            .install_root
            .join(format!("async-profiler-{version}-{platform}"));
        if expected.join("bin").join("asprof").is_file() {
            return Ok(expected);
        }
        // Release layouts have varied; accept any extracted dir with a launcher.
        for entry in fs::read_dir(&self.install_root)? {
            let path = entry?.path();
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
            if path.is_dir()
                && name.is_some_and(|n| n.starts_with("async-profiler"))
                && path.join("bin").join("asprof").is_file()
            {
                return Ok(path);
            }
        }
        Err(failed("no bin/asprof inside the archive".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct StubTransport {
        payload: Vec<u8>,
        fetches: Rc<Cell<usize>>,
    }

    impl Transport for StubTransport {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn available(&self) -> bool {
            true
        }
        fn fetch(&self, _url: &str, dest: &Path) -> anyhow::Result<u64> {
            self.fetches.set(self.fetches.get() + 1);
            fs::write(dest, &self.payload)?;
            Ok(self.payload.len() as u64)
        }
    }

    struct DownTransport;

    impl Transport for DownTransport {
        fn name(&self) -> &'static str {
            "down"
        }
        fn available(&self) -> bool {
            false
        }
        fn fetch(&self, _url: &str, _dest: &Path) -> anyhow::Result<u64> {
            unreachable!("unavailable transports must not be asked to fetch")
        }
    }

    struct FlakyTransport;

    impl Transport for FlakyTransport {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn available(&self) -> bool {
            true
        }
        fn fetch(&self, _url: &str, _dest: &Path) -> anyhow::Result<u64> {
            anyhow::bail!("connection reset")
        }
    }

    fn fixture_archive(version: &str, platform: PlatformTag) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let dir = format!("async-profiler-{version}-{}", platform.as_str());
        for name in ["asprof", "jfrconv"] {
            let body = b"#!/bin/sh\nexit 0\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o755);
            builder
                .append_data(&mut header, format!("{dir}/bin/{name}"), body.as_slice())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn provisioner_with(cache: &Path, transports: Vec<Box<dyn Transport>>) -> Provisioner {
        Provisioner::new(cache)
            .with_transports(transports)
            .with_min_archive_bytes(64)
    }

    fn leftover_parts(cache: &Path) -> Vec<PathBuf> {
        fs::read_dir(cache)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "part"))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn install_extracts_and_links_current() {
        let tmp = TempDir::new().unwrap();
        let fetches = Rc::new(Cell::new(0));
        let provisioner = provisioner_with(
            tmp.path(),
            vec![Box::new(StubTransport {
                payload: fixture_archive("4.0", PlatformTag::LinuxX64),
                fetches: Rc::clone(&fetches),
            })],
        );

        let installation = provisioner
            .ensure_installed(PlatformTag::LinuxX64, "4.0")
            .unwrap();

        assert!(installation.verified);
        assert!(installation.asprof().is_file());
        assert!(installation.jfrconv().is_file());
        assert!(fs::symlink_metadata(&installation.current)
            .unwrap()
            .file_type()
            .is_symlink());
        assert_eq!(fetches.get(), 1);
        assert!(leftover_parts(tmp.path()).is_empty());
    }

    #[test]
    fn second_call_reuses_the_installation() {
        let tmp = TempDir::new().unwrap();
        let fetches = Rc::new(Cell::new(0));
        let provisioner = provisioner_with(
            tmp.path(),
            vec![Box::new(StubTransport {
                payload: fixture_archive("4.0", PlatformTag::LinuxX64),
                fetches: Rc::clone(&fetches),
            })],
        );

        let first = provisioner
            .ensure_installed(PlatformTag::LinuxX64, "4.0")
            .unwrap();
        let second = provisioner
            .ensure_installed(PlatformTag::LinuxX64, "4.0")
            .unwrap();

        assert_eq!(fetches.get(), 1);
        assert!(first.verified);
        assert!(!second.verified);
        assert_eq!(first.asprof(), second.asprof());
    }

    #[test]
    fn truncated_download_is_rejected_and_cleaned_up() {
        let tmp = TempDir::new().unwrap();
        let provisioner = Provisioner::new(tmp.path())
            .with_transports(vec![Box::new(StubTransport {
                payload: vec![0u8; 40 * 1024],
                fetches: Rc::new(Cell::new(0)),
            })])
            .with_min_archive_bytes(1_000_000);

        let err = provisioner
            .ensure_installed(PlatformTag::LinuxX64, "4.0")
            .unwrap_err();

        match err {
            ProvisionError::DownloadFailed { reason, .. } => {
                assert!(reason.contains("40960 bytes"), "reason: {reason}");
            }
            other => panic!("expected DownloadFailed, got {other:?}"),
        }
        assert!(leftover_parts(tmp.path()).is_empty());
        assert!(fs::symlink_metadata(tmp.path().join("current")).is_err());
    }

    #[test]
    fn garbage_archive_reports_extraction_failure() {
        let tmp = TempDir::new().unwrap();
        let provisioner = provisioner_with(
            tmp.path(),
            vec![Box::new(StubTransport {
                payload: vec![7u8; 4096],
                fetches: Rc::new(Cell::new(0)),
            })],
        );

        let err = provisioner
            .ensure_installed(PlatformTag::LinuxX64, "4.0")
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ExtractionFailed { .. }));
        assert!(leftover_parts(tmp.path()).is_empty());
    }

    #[test]
    fn transports_fall_through_in_order() {
        let tmp = TempDir::new().unwrap();
        let fetches = Rc::new(Cell::new(0));
        let provisioner = provisioner_with(
            tmp.path(),
            vec![
                Box::new(FlakyTransport),
                Box::new(StubTransport {
                    payload: fixture_archive("4.0", PlatformTag::LinuxX64),
                    fetches: Rc::clone(&fetches),
                }),
            ],
        );

        provisioner
            .ensure_installed(PlatformTag::LinuxX64, "4.0")
            .unwrap();
        assert_eq!(fetches.get(), 1);
    }

    #[test]
    fn no_usable_transport_is_its_own_error() {
        let tmp = TempDir::new().unwrap();
        let provisioner = provisioner_with(tmp.path(), vec![Box::new(DownTransport)]);

        let err = provisioner
            .ensure_installed(PlatformTag::LinuxX64, "4.0")
            .unwrap_err();
        match err {
            ProvisionError::NoTransportAvailable { tried } => {
                assert!(tried.contains("down"));
            }
            other => panic!("expected NoTransportAvailable, got {other:?}"),
        }
    }

    #[test]
    fn release_url_matches_published_layout() {
        assert_eq!(
            release_url("4.0", PlatformTag::LinuxArm64),
            "https://github.com/async-profiler/async-profiler/releases/download/v4.0/async-profiler-4.0-linux-arm64.tar.gz"
        );
        assert_eq!(
            release_url("4.0", PlatformTag::MacOs),
            "https://github.com/async-profiler/async-profiler/releases/download/v4.0/async-profiler-4.0-macos.zip"
        );
    }

    #[test]
    fn kernel_sampling_is_linux_only() {
        assert!(PlatformTag::LinuxX64.supports_kernel_sampling());
        assert!(PlatformTag::LinuxArm64.supports_kernel_sampling());
        assert!(!PlatformTag::MacOs.supports_kernel_sampling());
    }
}
