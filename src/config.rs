use crate::model::Urgency;
use crate::storage::DEFAULT_STORAGE_KEY;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATA_DIR_ENV: &str = "TASKFLOW_DATA_DIR";

pub const DEFAULT_TAGS: [&str; 7] = [
    "Work", "Personal", "Urgent", "Shopping", "Health", "Finance", "Ideas",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub storage_key: String,
    /// The known label set offered by the form and the tag filter.
    pub tags: Vec<String>,
    pub default_urgency: Urgency,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            tags: DEFAULT_TAGS.iter().map(|t| t.to_string()).collect(),
            default_urgency: Urgency::Low,
        }
    }
}

impl Config {
    /// Loads `explicit` if given, otherwise the per-user config file. A missing
    /// file means defaults; a file that exists but does not parse is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => project_dirs().map(|dirs| dirs.config_dir().join("config.yml")),
        };
        let mut config = match path {
            Some(path) if path.exists() => Config::from_file(&path)?,
            Some(path) if explicit.is_some() => {
                anyhow::bail!("config file {:?} does not exist", path)
            }
            _ => Config::default(),
        };
        if let Some(dir) = env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        Config::from_yaml(&data).with_context(|| format!("parsing {:?}", path))
    }

    pub fn from_yaml(data: &str) -> Result<Config> {
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let config: Config = serde_yaml::from_str(data)?;
        Ok(config)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let dirs = project_dirs().context("locating data directory")?;
        Ok(dirs.data_dir().to_path_buf())
    }

    pub fn is_known_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "taskflow")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.storage_key, "taskflow_pro_todos_v1");
        assert!(config.is_known_tag("Finance"));
        assert!(!config.is_known_tag("finance"));
    }

    #[test]
    fn partial_yaml_overrides_only_given_fields() {
        let config = Config::from_yaml(
            "data_dir: /tmp/tasks\ntags: [Home, Garden]\ndefault_urgency: High\n",
        )
        .unwrap();
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/tasks")));
        assert_eq!(config.tags, vec!["Home", "Garden"]);
        assert_eq!(config.default_urgency, Urgency::High);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/tasks"));
    }

    #[test]
    fn unknown_keys_and_bad_values_fail() {
        assert!(Config::from_yaml("colour: blue\n").is_err());
        assert!(Config::from_yaml("default_urgency: Extreme\n").is_err());
    }

    #[test]
    fn explicit_file_is_read_and_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "storage_key: other_key\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.storage_key, "other_key");

        let missing = dir.path().join("missing.yml");
        assert!(Config::load(Some(missing.as_path())).is_err());
    }

    #[test]
    fn data_dir_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "data_dir: /from/file\n").unwrap();

        env::set_var(DATA_DIR_ENV, "/from/env");
        let overridden = Config::load(Some(path.as_path()));
        env::set_var(DATA_DIR_ENV, "");
        let ignored_when_empty = Config::load(Some(path.as_path()));
        env::remove_var(DATA_DIR_ENV);

        let overridden = overridden.unwrap();
        assert_eq!(overridden.data_dir, Some(PathBuf::from("/from/env")));
        assert_eq!(overridden.data_dir().unwrap(), PathBuf::from("/from/env"));
        assert_eq!(
            ignored_when_empty.unwrap().data_dir,
            Some(PathBuf::from("/from/file"))
        );
    }
}
