// tezpack-core/src/install/bottle.rs
// Pre-built bottle installation: download, verify, unpack, then hand every
// payload binary to the install mapper.
use std::fs;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tezpack_common::config::Config;
use tezpack_common::error::{Result, TezpackError};
use tezpack_common::model::Formula;
use tezpack_net::validation::verify_content_type;
use tracing::debug;

use crate::build::env::HostArch;
use crate::install::{self, InstallationRecord};

/// Bottle platform tag for the current build host. The tap publishes
/// monterey-baseline bottles only.
pub fn current_platform_tag(arch: HostArch) -> &'static str {
    match arch {
        HostArch::Arm64 => "arm64_monterey",
        HostArch::X86_64 => "monterey",
    }
}

pub async fn install_from_bottle(
    formula: &Formula,
    platform_tag: &str,
    sha256: &str,
    config: &Config,
    record: InstallationRecord,
) -> Result<InstallationRecord> {
    let archive_path = tezpack_net::fetch_bottle(
        &formula.name,
        &formula.version_str_full(),
        platform_tag,
        &formula.bottle.root_url,
        sha256,
        &config.bottle_cache_dir(),
    )
    .await?;

    install_bottle_archive(formula, &archive_path, config, record)
}

/// Unpacks a verified bottle archive and maps its binaries into the prefix.
pub(crate) fn install_bottle_archive(
    formula: &Formula,
    archive_path: &Path,
    config: &Config,
    mut record: InstallationRecord,
) -> Result<InstallationRecord> {
    verify_content_type(archive_path, "gz")?;

    fs::create_dir_all(config.cache_dir())?;
    let unpack_dir = tempfile::tempdir_in(config.cache_dir())?;
    debug!(
        "Unpacking bottle {} into {}",
        archive_path.display(),
        unpack_dir.path().display()
    );

    let file = fs::File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive.unpack(unpack_dir.path()).map_err(|e| {
        TezpackError::InstallError(format!(
            "Failed to unpack bottle {}: {}",
            archive_path.display(),
            e
        ))
    })?;

    // Bottle layout: <name>/<full version>/bin/<binaries>
    let payload_bin = unpack_dir
        .path()
        .join(&formula.name)
        .join(formula.version_str_full())
        .join("bin");
    if !payload_bin.is_dir() {
        return Err(TezpackError::InstallError(format!(
            "Bottle for '{}' does not contain the expected payload directory {}",
            formula.name,
            payload_bin.display()
        )));
    }

    let mut staged: Vec<PathBuf> = fs::read_dir(&payload_bin)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    staged.sort();

    for path in staged {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                TezpackError::InstallError(format!(
                    "Bottle payload contains a non-UTF8 file name: {}",
                    path.display()
                ))
            })?
            .to_string();
        record = install::install_binary(&name, &path, config, record)?;
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tezpack_common::Formulary;

    use super::*;

    /// Builds a minimal bottle archive with the layout the tap publishes.
    fn write_bottle(dir: &Path, formula: &Formula, binaries: &[&str]) -> PathBuf {
        let staging = dir.join("staging");
        let payload_bin = staging
            .join(&formula.name)
            .join(formula.version_str_full())
            .join("bin");
        fs::create_dir_all(&payload_bin).unwrap();
        for name in binaries {
            fs::write(payload_bin.join(name), b"binary").unwrap();
        }

        let archive_path = dir.join(format!("{}.bottle.tar.gz", formula.name));
        let file = fs::File::create(&archive_path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            builder.append_dir_all(&formula.name, staging.join(&formula.name)).unwrap();
            builder.finish().unwrap();
        }
        encoder.try_finish().unwrap();
        archive_path
    }

    #[test]
    fn unpacks_payload_and_maps_binaries_with_aliases() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            prefix: tmp.path().join("prefix"),
        };
        fs::create_dir_all(config.cache_dir()).unwrap();
        let formula = Formulary::new().load_formula("tezos-dal-node").unwrap();
        let archive = write_bottle(tmp.path(), &formula, &["octez-dal-node"]);

        let record =
            install_bottle_archive(&formula, &archive, &config, InstallationRecord::new())
                .unwrap();

        assert!(config.bin_dir().join("octez-dal-node").is_file());
        assert!(fs::symlink_metadata(config.bin_dir().join("tezos-dal-node"))
            .unwrap()
            .file_type()
            .is_symlink());
        assert_eq!(record.installed_names(), ["octez-dal-node"]);
    }

    #[test]
    fn rejects_an_archive_with_the_wrong_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            prefix: tmp.path().join("prefix"),
        };
        fs::create_dir_all(config.cache_dir()).unwrap();
        let formula = Formulary::new().load_formula("tezos-dal-node").unwrap();

        // A gzip'd tar with no payload directory at all.
        let archive_path = tmp.path().join("broken.bottle.tar.gz");
        let file = fs::File::create(&archive_path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        {
            let mut builder = tar::Builder::new(&mut encoder);
            let mut header = tar::Header::new_gnu();
            header.set_size(5);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "README", &b"empty"[..])
                .unwrap();
            builder.finish().unwrap();
        }
        encoder.try_finish().unwrap();

        let err =
            install_bottle_archive(&formula, &archive_path, &config, InstallationRecord::new())
                .unwrap_err();
        assert!(matches!(err, TezpackError::InstallError(_)));
    }

    #[test]
    fn rejects_a_non_gzip_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            prefix: tmp.path().join("prefix"),
        };
        fs::create_dir_all(config.cache_dir()).unwrap();
        let formula = Formulary::new().load_formula("tezos-dal-node").unwrap();

        let archive_path = tmp.path().join("not-a-bottle.tar.gz");
        let mut file = fs::File::create(&archive_path).unwrap();
        file.write_all(b"plainly not gzip data, long enough to fingerprint")
            .unwrap();

        let err =
            install_bottle_archive(&formula, &archive_path, &config, InstallationRecord::new())
                .unwrap_err();
        assert!(matches!(err, TezpackError::ValidationError(_)));
    }

    #[test]
    fn platform_tags_follow_the_host_arch() {
        assert_eq!(current_platform_tag(HostArch::Arm64), "arm64_monterey");
        assert_eq!(current_platform_tag(HostArch::X86_64), "monterey");
    }
}
