// tezpack-common/src/model/formula.rs
// The static, declarative description of one installable artifact.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dependency::{Dependency, DependencyExt, DependencyTag};
use crate::error::{Result, TezpackError};
use crate::model::service::ServiceDefinition;

/// Bottle platform tags the project publishes pre-built artifacts for.
pub const SUPPORTED_BOTTLE_PLATFORMS: &[&str] =
    &["arm64_monterey", "monterey", "arm64_ventura", "ventura"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceSpec {
    /// Git repository of the upstream project.
    pub url: String,
    /// Pinned release tag.
    pub tag: String,
    /// The upstream build inspects repository tags, so clones must not be
    /// shallow.
    #[serde(default)]
    pub shallow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BottleSpec {
    #[serde(default)]
    pub root_url: String,
    /// platform tag -> sha256 of the pre-built bottle archive.
    #[serde(default)]
    pub files: HashMap<String, String>,
}

/// The two external toolchains a formula build pins. The opam pin is a hard
/// compatibility constraint, not a preference: the upstream build breaks on
/// opam >= 2.1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolchainSpec {
    pub rust: String,
    pub opam: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildTarget {
    /// Build target path within the source tree, as understood by dune.
    pub build_path: String,
    /// Where dune deposits the compiled binary.
    pub artifact_path: String,
    /// Final binary name under the installation bin directory.
    pub installed_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    pub name: String,
    /// Upstream tag-style version, e.g. "v17.3".
    pub version: String,
    #[serde(default)]
    pub revision: u32,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    pub source: SourceSpec,
    #[serde(default, deserialize_with = "deserialize_dependencies")]
    pub dependencies: Vec<Dependency>,
    pub toolchain: ToolchainSpec,
    #[serde(default)]
    pub bottle: BottleSpec,
    pub targets: Vec<BuildTarget>,
    #[serde(default)]
    pub service: Option<ServiceDefinition>,
    /// Prefix-relative state directories created by the post-install hook.
    #[serde(default)]
    pub post_install: Vec<String>,
}

impl Formula {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full version string including the packaging revision (e.g. "v17.3-1").
    pub fn version_str_full(&self) -> String {
        if self.revision > 0 {
            format!("{}-{}", self.version, self.revision)
        } else {
            self.version.clone()
        }
    }

    pub fn build_dependencies(&self) -> Vec<&Dependency> {
        self.dependencies.build_time()
    }

    pub fn runtime_dependencies(&self) -> Vec<&Dependency> {
        self.dependencies.runtime()
    }

    /// Bottle checksum for the given platform tag, if one is published.
    pub fn bottle_for_platform(&self, platform_tag: &str) -> Option<&str> {
        self.bottle.files.get(platform_tag).map(String::as_str)
    }

    /// Checks the descriptor's internal invariants. Runs before any file is
    /// touched, so a bad record is a configuration error rather than a
    /// half-finished install.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(TezpackError::ValidationError(
                "Formula name must not be empty".to_string(),
            ));
        }
        if self.version.is_empty() {
            return Err(TezpackError::ValidationError(format!(
                "Formula '{}' has an empty version",
                self.name
            )));
        }
        if self.targets.is_empty() {
            return Err(TezpackError::ValidationError(format!(
                "Formula '{}' declares no build targets",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if !seen.insert(target.installed_name.as_str()) {
                return Err(TezpackError::ValidationError(format!(
                    "Formula '{}' declares duplicate installed name '{}'",
                    self.name, target.installed_name
                )));
            }
        }

        for tag in self.bottle.files.keys() {
            if !SUPPORTED_BOTTLE_PLATFORMS.contains(&tag.as_str()) {
                return Err(TezpackError::ValidationError(format!(
                    "Formula '{}' declares a bottle for unsupported platform '{}'",
                    self.name, tag
                )));
            }
        }

        if let Some(service) = &self.service {
            if !seen.contains(service.run.as_str()) {
                return Err(TezpackError::ValidationError(format!(
                    "Formula '{}' service runs '{}', which is not a declared target",
                    self.name, service.run
                )));
            }
        }

        for dir in &self.post_install {
            if dir.starts_with('/') {
                return Err(TezpackError::ValidationError(format!(
                    "Formula '{}' post-install path '{}' must be prefix-relative",
                    self.name, dir
                )));
            }
        }

        Ok(())
    }
}

/// Dependencies come either as plain strings (runtime) or as objects with a
/// name and a tag list, matching how the formula records are written.
fn deserialize_dependencies<'de, D>(deserializer: D) -> std::result::Result<Vec<Dependency>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de;

    let raw: Vec<Value> = Deserialize::deserialize(deserializer)?;
    let mut deps = Vec::with_capacity(raw.len());

    for value in raw {
        match value {
            Value::String(name) => deps.push(Dependency::new_runtime(name)),
            Value::Object(map) => {
                let name = map
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| de::Error::missing_field("name in dependency object"))?
                    .to_string();
                let tag_values = map
                    .get("tags")
                    .and_then(Value::as_array)
                    .ok_or_else(|| de::Error::missing_field("tags in dependency object"))?;

                let mut tags = DependencyTag::empty();
                for tag in tag_values {
                    match tag.as_str() {
                        Some("build") => tags |= DependencyTag::BUILD,
                        Some("test") => tags |= DependencyTag::TEST,
                        Some("optional") => tags |= DependencyTag::OPTIONAL,
                        Some("recommended") => tags |= DependencyTag::RECOMMENDED,
                        Some("runtime") => tags |= DependencyTag::RUNTIME,
                        Some(other) => {
                            return Err(de::Error::custom(format!(
                                "unknown dependency tag '{other}'"
                            )))
                        }
                        None => {
                            return Err(de::Error::custom("dependency tag must be a string"))
                        }
                    }
                }
                if tags.is_empty() {
                    tags = DependencyTag::RUNTIME;
                }
                deps.push(Dependency::new_with_tags(name, tags));
            }
            other => {
                return Err(de::Error::custom(format!(
                    "dependency must be a string or an object, got {other}"
                )))
            }
        }
    }

    Ok(deps)
}
