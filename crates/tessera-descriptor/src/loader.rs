//! Descriptor loading from JSON, YAML and TOML files.
//!
//! Files sharing a basename across all scanned directories are grouped and one
//! file per group is selected: JSON first, then YAML, then TOML. Directories
//! are scanned non-recursively.

use crate::{
    definition::ServiceDescriptor,
    error::{DescriptorError, Result},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tessera_core::ServiceKey;
use tracing::{debug, info, warn};

/// Descriptor file formats, in selection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Where a loaded descriptor came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSource {
    /// File the descriptor was parsed from
    pub selected_path: PathBuf,
    /// Every file sharing the selected file's basename
    pub candidates: Vec<PathBuf>,
}

impl DescriptorSource {
    /// File name of the selected path.
    #[must_use]
    pub fn selected_file(&self) -> String {
        self.selected_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A parsed, validated descriptor together with its source.
#[derive(Debug, Clone)]
pub struct LoadedDescriptor {
    /// The descriptor
    pub descriptor: ServiceDescriptor,
    /// Where it was loaded from
    pub source: DescriptorSource,
}

/// Loader for service descriptors from one or more directories.
pub struct DescriptorLoader {
    dirs: Vec<PathBuf>,
}

impl DescriptorLoader {
    /// Create a loader over a single directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(DescriptorError::DirectoryNotFound {
                path: dir.display().to_string(),
            });
        }
        Ok(Self { dirs: vec![dir] })
    }

    /// Create a loader over every existing directory in `dirs`.
    ///
    /// Missing directories are logged and ignored.
    #[must_use]
    pub fn from_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let dirs = dirs
            .into_iter()
            .map(Into::into)
            .filter(|dir: &PathBuf| {
                let exists = dir.is_dir();
                if !exists {
                    debug!(dir = %dir.display(), "descriptor directory does not exist");
                }
                exists
            })
            .collect();
        Self { dirs }
    }

    /// Directories this loader scans.
    #[must_use]
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Load every descriptor.
    ///
    /// Returns the descriptors plus a warning for each basename that had more
    /// than one candidate file. Files that fail to parse or validate are
    /// logged and skipped.
    ///
    /// # Errors
    /// Returns error if a directory can't be read.
    pub fn load_all(&self) -> Result<(Vec<LoadedDescriptor>, Vec<String>)> {
        let groups = self.group_files()?;
        let mut loaded = Vec::new();
        let mut warnings = Vec::new();

        for (base, mut candidates) in groups {
            candidates.sort_by(|(a_path, a_fmt), (b_path, b_fmt)| {
                a_fmt.cmp(b_fmt).then_with(|| a_path.cmp(b_path))
            });

            let Some((selected_path, _)) = candidates.first().cloned() else {
                continue;
            };

            if candidates.len() > 1 {
                let mut names: Vec<String> = candidates
                    .iter()
                    .filter_map(|(p, _)| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .collect();
                names.sort();
                let warning = format!(
                    "Multiple descriptor files for service '{base}': {}. Selected '{}' (JSON preferred).",
                    names.join(", "),
                    selected_path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default()
                );
                warn!(service = %base, "{warning}");
                warnings.push(warning);
            }

            let descriptor = match Self::load_from_path(&selected_path) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!(
                        path = %selected_path.display(),
                        error = %e,
                        "failed to load service descriptor"
                    );
                    continue;
                }
            };

            if let Err(e) = descriptor.validate() {
                warn!(
                    path = %selected_path.display(),
                    error = %e,
                    "skipping invalid service descriptor"
                );
                continue;
            }

            debug!(
                service = %descriptor.key(),
                path = %selected_path.display(),
                "loaded service descriptor"
            );

            loaded.push(LoadedDescriptor {
                descriptor,
                source: DescriptorSource {
                    selected_path,
                    candidates: candidates.into_iter().map(|(p, _)| p).collect(),
                },
            });
        }

        info!(
            count = loaded.len(),
            dirs = self.dirs.len(),
            "loaded service descriptors"
        );

        Ok((loaded, warnings))
    }

    /// Load a single descriptor by service key.
    ///
    /// # Errors
    /// Returns error if no loaded descriptor has that key.
    pub fn load(&self, service_key: &ServiceKey) -> Result<ServiceDescriptor> {
        let (loaded, _) = self.load_all()?;
        loaded
            .into_iter()
            .find(|l| l.descriptor.key() == service_key)
            .map(|l| l.descriptor)
            .ok_or_else(|| DescriptorError::NotFound {
                service_key: service_key.to_string(),
            })
    }

    /// Parse a descriptor file according to its extension.
    ///
    /// # Errors
    /// Returns error if the file can't be read, isn't a mapping, or doesn't
    /// describe a service.
    pub fn load_from_path(path: &Path) -> Result<ServiceDescriptor> {
        let format = Format::from_path(path).ok_or_else(|| DescriptorError::ParseError {
            path: path.display().to_string(),
            reason: "unsupported file extension".to_string(),
        })?;

        let contents = std::fs::read_to_string(path).map_err(|e| DescriptorError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;

        let parse_error = |reason: String| DescriptorError::ParseError {
            path: path.display().to_string(),
            reason,
        };

        let value: serde_json::Value = match format {
            Format::Json => serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string()))?,
            Format::Yaml => {
                serde_yaml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?
            }
            Format::Toml => {
                let table: toml::Value =
                    toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?;
                serde_json::to_value(table)?
            }
        };

        if !value.is_object() {
            return Err(parse_error("descriptor file is not a mapping".to_string()));
        }

        ServiceDescriptor::from_value(value)
    }

    fn group_files(&self) -> Result<BTreeMap<String, Vec<(PathBuf, Format)>>> {
        let mut groups: BTreeMap<String, Vec<(PathBuf, Format)>> = BTreeMap::new();

        for dir in &self.dirs {
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if !path.is_file() {
                    continue;
                }
                let Some(format) = Format::from_path(&path) else {
                    continue;
                };
                let Some(base) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                groups
                    .entry(base.to_string())
                    .or_default()
                    .push((path.clone(), format));
            }
        }

        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, contents).expect("write descriptor file");
        path
    }

    const JSON_DESCRIPTOR: &str = r#"{
        "service_key": "dummy",
        "display_name": "Dummy JSON",
        "endpoints": [{"url": "https://example.com/${phone}"}]
    }"#;

    const YAML_DESCRIPTOR: &str = r"
service_key: dummy
display_name: Dummy YAML
endpoints:
  - url: https://example.com/${phone}
    success_signals:
      - type: status
        equals: 200
        weight: 1.0
";

    const TOML_DESCRIPTOR: &str = r#"
service_key = "tomlsvc"
display_name = "Toml Service"
requires_proxy = true

[[endpoints]]
url = "https://example.com/${phone}"

[[endpoints.success_signals]]
type = "status"
equals = 200
weight = 1.0
"#;

    #[test]
    fn test_loader_new_with_nonexistent_dir() {
        let loader = DescriptorLoader::new("/nonexistent/path/to/descriptors");
        assert!(matches!(
            loader,
            Err(DescriptorError::DirectoryNotFound { .. })
        ));
    }

    #[test]
    fn test_from_dirs_ignores_missing() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let loader = DescriptorLoader::from_dirs([
            temp_dir.path().to_path_buf(),
            PathBuf::from("/nonexistent/descriptors"),
        ]);
        assert_eq!(loader.dirs().len(), 1);
    }

    #[test]
    fn test_load_each_format() {
        let temp_dir = TempDir::new().expect("create temp dir");
        write(temp_dir.path(), "dummy.yaml", YAML_DESCRIPTOR);
        write(temp_dir.path(), "tomlsvc.toml", TOML_DESCRIPTOR);

        let loader = DescriptorLoader::new(temp_dir.path()).expect("create loader");
        let (loaded, warnings) = loader.load_all().expect("load descriptors");

        assert!(warnings.is_empty());
        assert_eq!(loaded.len(), 2);

        let toml = loaded
            .iter()
            .find(|l| l.descriptor.key().as_str() == "tomlsvc")
            .expect("toml descriptor loaded");
        assert!(toml.descriptor.requires_proxy);
        assert_eq!(toml.descriptor.endpoints[0].success_signals.len(), 1);
    }

    #[test]
    fn test_json_preferred_over_yaml() {
        let temp_dir = TempDir::new().expect("create temp dir");
        write(temp_dir.path(), "dummy.yaml", YAML_DESCRIPTOR);
        let json_path = write(temp_dir.path(), "dummy.json", JSON_DESCRIPTOR);

        let loader = DescriptorLoader::new(temp_dir.path()).expect("create loader");
        let (loaded, warnings) = loader.load_all().expect("load descriptors");

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].descriptor.display_name, "Dummy JSON");
        assert_eq!(loaded[0].source.selected_path, json_path);
        assert_eq!(loaded[0].source.candidates.len(), 2);
        assert_eq!(loaded[0].source.selected_file(), "dummy.json");

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("dummy.json, dummy.yaml"));
    }

    #[test]
    fn test_parse_failures_skipped() {
        let temp_dir = TempDir::new().expect("create temp dir");
        write(temp_dir.path(), "dummy.json", JSON_DESCRIPTOR);
        write(temp_dir.path(), "broken.json", "{ not json");
        write(temp_dir.path(), "list.json", "[1, 2, 3]");
        write(temp_dir.path(), "nokey.json", r#"{"display_name": "No key"}"#);
        write(temp_dir.path(), "README.md", "ignored");

        let loader = DescriptorLoader::new(temp_dir.path()).expect("create loader");
        let (loaded, _) = loader.load_all().expect("load descriptors");

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].descriptor.key().as_str(), "dummy");
    }

    #[test]
    fn test_load_by_key() {
        let temp_dir = TempDir::new().expect("create temp dir");
        write(temp_dir.path(), "dummy.json", JSON_DESCRIPTOR);

        let loader = DescriptorLoader::new(temp_dir.path()).expect("create loader");
        let key = ServiceKey::new("dummy").expect("valid key");
        assert!(loader.load(&key).is_ok());

        let missing = ServiceKey::new("missing").expect("valid key");
        assert!(matches!(
            loader.load(&missing),
            Err(DescriptorError::NotFound { .. })
        ));
    }

    #[test]
    fn test_subdirectories_not_scanned() {
        let temp_dir = TempDir::new().expect("create temp dir");
        let nested = temp_dir.path().join("nested");
        std::fs::create_dir_all(&nested).expect("create nested dir");
        write(&nested, "dummy.json", JSON_DESCRIPTOR);

        let loader = DescriptorLoader::new(temp_dir.path()).expect("create loader");
        let (loaded, _) = loader.load_all().expect("load descriptors");
        assert!(loaded.is_empty());
    }
}
