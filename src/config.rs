// csp_validator::config
//
// Settings file.  Built once at startup and passed down to the validator;
// nothing here is global.
//
//   projects_path: /checkfix/projects
//   hosts_file: domains_with_ports.txt
//   timeout_secs: 5
//   max_redirects: 10
//   accept_invalid_certs: true

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Looked up in the working directory when no settings path is given.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one sub-directory per project.
    pub projects_path: PathBuf,
    /// Name of the `host[:port]` list inside a project directory.
    pub hosts_file: String,
    pub timeout_secs: u64,
    /// Cap on chained meta-refresh redirects per host.
    pub max_redirects: usize,
    pub accept_invalid_certs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            projects_path: PathBuf::from("/checkfix/projects"),
            hosts_file: "domains_with_ports.txt".to_string(),
            timeout_secs: 5,
            max_redirects: 10,
            accept_invalid_certs: true,
        }
    }
}

impl Config {
    /// Load settings.  An explicit path must exist; otherwise
    /// `settings.yaml` is used when present, and the defaults when not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_SETTINGS_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_SETTINGS_FILE))
            }
            None => {
                debug!("no settings file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(text)?;
        if config.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be positive".to_string()));
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory of `project` under `projects_path`.
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.projects_path.join(project)
    }

    /// The hosts list of `project`.
    pub fn hosts_path(&self, project: &str) -> PathBuf {
        self.project_dir(project).join(&self.hosts_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.max_redirects, 10);
        assert!(config.accept_invalid_certs);
        assert_eq!(
            config.hosts_path("acme"),
            PathBuf::from("/checkfix/projects/acme/domains_with_ports.txt")
        );
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = Config::from_yaml("projects_path: /data/projects\ntimeout_secs: 2\n").unwrap();
        assert_eq!(config.projects_path, PathBuf::from("/data/projects"));
        assert_eq!(config.timeout_secs, 2);
        assert_eq!(config.hosts_file, "domains_with_ports.txt");
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn rejects_bad_yaml() {
        assert!(matches!(Config::from_yaml("timeout_secs: soon"), Err(Error::Yaml(_))));
        assert!(matches!(Config::from_yaml("timeout_secs: 0"), Err(Error::Config(_))));
    }

    #[test]
    fn loads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hosts_file: hosts.txt\nmax_redirects: 2").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.hosts_file, "hosts.txt");
        assert_eq!(config.max_redirects, 2);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(matches!(Config::load(Some(missing.as_path())), Err(Error::Config(_))));
    }
}
