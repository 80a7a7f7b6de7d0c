//! Project settings: where relative dataset URIs resolve, where topology
//! caches live and where the catalog database is.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use wms_common::{WmsError, WmsResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base directory for relative dataset URIs
    pub project_root: PathBuf,

    /// Directory holding topology cache files
    pub topology_path: PathBuf,

    /// SQLite catalog file
    pub database_path: PathBuf,
}

/// Settings file shape; every field optional.
#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    project_root: Option<PathBuf>,
    topology_path: Option<PathBuf>,
    database_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_root(PathBuf::from("."))
    }
}

impl Settings {
    /// Defaults relative to `project_root`.
    pub fn with_root(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            topology_path: project_root.join("topology"),
            database_path: project_root.join("sciwms.db"),
            project_root,
        }
    }

    /// Load settings from `SCIWMS_PROJECT_ROOT`, `SCIWMS_TOPOLOGY_PATH`
    /// and `SCIWMS_DATABASE`.
    pub fn from_env() -> Self {
        let mut settings = env::var("SCIWMS_PROJECT_ROOT")
            .map(Self::with_root)
            .unwrap_or_default();

        if let Ok(path) = env::var("SCIWMS_TOPOLOGY_PATH") {
            settings.topology_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("SCIWMS_DATABASE") {
            settings.database_path = PathBuf::from(path);
        }
        settings
    }

    /// Load settings from a YAML file; missing fields take the defaults.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> WmsResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            WmsError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&contents)
            .map_err(|e| WmsError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    fn from_yaml_str(contents: &str) -> WmsResult<Self> {
        let file: SettingsFile = if contents.trim().is_empty() {
            SettingsFile::default()
        } else {
            serde_yaml::from_str(contents)
                .map_err(|e| WmsError::ConfigError(format!("Invalid settings YAML: {}", e)))?
        };

        let mut settings = file
            .project_root
            .map(Self::with_root)
            .unwrap_or_default();
        if let Some(path) = file.topology_path {
            settings.topology_path = path;
        }
        if let Some(path) = file.database_path {
            settings.database_path = path;
        }
        Ok(settings)
    }

    /// Create the topology directory if needed.
    pub fn ensure_dirs(&self) -> WmsResult<()> {
        std::fs::create_dir_all(&self.topology_path).map_err(|e| {
            WmsError::ConfigError(format!(
                "Cannot create topology directory {}: {}",
                self.topology_path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_root() {
        let s = Settings::with_root("/srv/sciwms");
        assert_eq!(s.topology_path, PathBuf::from("/srv/sciwms/topology"));
        assert_eq!(s.database_path, PathBuf::from("/srv/sciwms/sciwms.db"));
    }

    #[test]
    fn test_yaml_partial() {
        let s = Settings::from_yaml_str("project_root: /data\ntopology_path: /cache/topo\n").unwrap();
        assert_eq!(s.project_root, PathBuf::from("/data"));
        assert_eq!(s.topology_path, PathBuf::from("/cache/topo"));
        assert_eq!(s.database_path, PathBuf::from("/data/sciwms.db"));

        assert_eq!(Settings::from_yaml_str("").unwrap(), Settings::default());
        assert!(Settings::from_yaml_str("project_root: [1, 2").is_err());
    }

    #[test]
    fn test_yaml_file_and_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let topo = dir.path().join("nested/topology");
        let file = dir.path().join("sciwms.yaml");
        std::fs::write(&file, format!("topology_path: {}\n", topo.display())).unwrap();

        let s = Settings::from_yaml(&file).unwrap();
        assert_eq!(s.topology_path, topo);
        s.ensure_dirs().unwrap();
        assert!(topo.is_dir());

        assert!(matches!(
            Settings::from_yaml(dir.path().join("missing.yaml")),
            Err(WmsError::ConfigError(_))
        ));
    }
}
