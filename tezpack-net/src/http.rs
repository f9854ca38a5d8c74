use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tezpack_common::error::{Result, TezpackError};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};

use crate::validation::{validate_url, verify_checksum};

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "tezpack installer (Rust)";

/// Architecture-specific, versioned download of the pinned opam binary.
/// Written as `<dest_dir>/opam`; the caller marks it executable.
pub async fn fetch_opam_installer(version: &str, arch: &str, dest_dir: &Path) -> Result<PathBuf> {
    let url = format!(
        "https://github.com/ocaml/opam/releases/download/{version}/opam-{version}-{arch}-macos"
    );
    validate_url(&url)?;
    fs::create_dir_all(dest_dir).map_err(|e| {
        TezpackError::BuildEnvError(format!(
            "Failed to create opam bin directory {}: {}",
            dest_dir.display(),
            e
        ))
    })?;

    let dest = dest_dir.join("opam");
    debug!(
        "Downloading opam {} for {} from {} to {}",
        version,
        arch,
        url,
        dest.display()
    );

    let client = build_http_client()?;
    // Upstream publishes no checksum for the opam installer binaries.
    download_and_verify(&client, &url, &dest, "").await?;
    Ok(dest)
}

/// Downloads a pre-built bottle into the bottle cache, reusing a cached copy
/// when its checksum still matches.
pub async fn fetch_bottle(
    formula_name: &str,
    version_full: &str,
    platform_tag: &str,
    root_url: &str,
    sha256_expected: &str,
    cache_dir: &Path,
) -> Result<PathBuf> {
    let filename = format!("{formula_name}-{version_full}.{platform_tag}.bottle.tar.gz");
    let url = format!("{root_url}{filename}");
    validate_url(&url)?;

    fs::create_dir_all(cache_dir).map_err(|e| {
        TezpackError::Generic(format!(
            "Failed to create bottle cache directory {}: {}",
            cache_dir.display(),
            e
        ))
    })?;
    let cache_path = cache_dir.join(&filename);

    debug!(
        "Preparing to fetch bottle for '{}' from URL: {}",
        formula_name, url
    );
    debug!("Target cache path: {}", cache_path.display());
    debug!("Expected SHA256: {}", sha256_expected);

    if cache_path.is_file() {
        match verify_checksum(&cache_path, sha256_expected) {
            Ok(()) => {
                debug!("Using valid cached bottle: {}", cache_path.display());
                return Ok(cache_path);
            }
            Err(e) => {
                debug!(
                    "Cached bottle checksum mismatch ({}): {}. Redownloading.",
                    cache_path.display(),
                    e
                );
                if let Err(remove_err) = fs::remove_file(&cache_path) {
                    debug!(
                        "Failed to remove corrupted cached bottle {}: {}",
                        cache_path.display(),
                        remove_err
                    );
                }
            }
        }
    } else {
        debug!("Bottle not found in cache.");
    }

    let client = build_http_client()?;
    match download_and_verify(&client, &url, &cache_path, sha256_expected).await {
        Ok(path) => {
            debug!("Successfully downloaded and verified: {}", path.display());
            Ok(path)
        }
        Err(e) => {
            error!("Bottle download failed from {}: {}", url, e);
            let _ = fs::remove_file(&cache_path);
            Err(TezpackError::DownloadError(
                formula_name.to_string(),
                url,
                format!("Download failed: {e}"),
            ))
        }
    }
}

fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, USER_AGENT_STRING.parse().unwrap());
    headers.insert(ACCEPT, "*/*".parse().unwrap());
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| TezpackError::Generic(format!("Failed to build HTTP client: {e}")))
}

async fn download_and_verify(
    client: &Client,
    url: &str,
    final_path: &Path,
    sha256_expected: &str,
) -> Result<PathBuf> {
    let temp_filename = format!(
        ".{}.download",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    let temp_path = final_path.with_file_name(temp_filename);
    debug!("Downloading to temporary path: {}", temp_path.display());
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!(
                "Could not remove existing temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }

    let response = client.get(url).send().await.map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        TezpackError::Generic(format!("HTTP request failed for {url}: {e}"))
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if !status.is_success() {
        let name = final_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        return match status {
            StatusCode::NOT_FOUND => Err(TezpackError::DownloadError(
                name,
                url.to_string(),
                "Resource not found (404)".to_string(),
            )),
            StatusCode::FORBIDDEN => Err(TezpackError::DownloadError(
                name,
                url.to_string(),
                "Access forbidden (403)".to_string(),
            )),
            _ => Err(TezpackError::DownloadError(
                name,
                url.to_string(),
                format!("HTTP error {status}"),
            )),
        };
    }

    let mut temp_file = TokioFile::create(&temp_path).await.map_err(|e| {
        TezpackError::Generic(format!(
            "Failed to create temp file {}: {}",
            temp_path.display(),
            e
        ))
    })?;
    let content = response
        .bytes()
        .await
        .map_err(|e| TezpackError::Generic(format!("Failed to read response body bytes: {e}")))?;
    temp_file.write_all(&content).await.map_err(|e| {
        TezpackError::Generic(format!(
            "Failed to write download stream to {}: {}",
            temp_path.display(),
            e
        ))
    })?;
    drop(temp_file);
    debug!("Finished writing download stream to temp file.");

    if !sha256_expected.is_empty() {
        verify_checksum(&temp_path, sha256_expected)?;
        debug!(
            "Checksum verified for temporary file: {}",
            temp_path.display()
        );
    } else {
        warn!(
            "Skipping checksum verification for {} - none provided.",
            temp_path.display()
        );
    }

    fs::rename(&temp_path, final_path).map_err(|e| {
        TezpackError::Generic(format!(
            "Failed to move temp file {} to {}: {}",
            temp_path.display(),
            final_path.display(),
            e
        ))
    })?;
    debug!(
        "Moved verified file to final location: {}",
        final_path.display()
    );
    Ok(final_path.to_path_buf())
}
