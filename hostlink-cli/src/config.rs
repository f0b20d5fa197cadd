use std::path::{Path, PathBuf};

use anyhow::Context;
use hostlink_runtime::RuntimeConfig;

pub const FILE_NAME: &str = "hostlink.toml";

/// Where a resolved config came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Project(PathBuf),
    User(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Explicit(path) | Self::Project(path) | Self::User(path) => Some(path.as_path()),
            Self::Defaults => None,
        }
    }
}

/// Resolves the runtime config: `--config`, then `hostlink.toml` walking up
/// from the current directory, then `<config_dir>/hostlink/config.toml`,
/// then defaults.
pub fn resolve(explicit: Option<&Path>) -> anyhow::Result<(RuntimeConfig, ConfigSource)> {
    let user = dirs::config_dir().map(|dir| dir.join("hostlink").join("config.toml"));
    resolve_from(explicit, &std::env::current_dir()?, user.as_deref())
}

pub fn resolve_from(
    explicit: Option<&Path>,
    start: &Path,
    user: Option<&Path>,
) -> anyhow::Result<(RuntimeConfig, ConfigSource)> {
    if let Some(path) = explicit {
        return Ok((load(path)?, ConfigSource::Explicit(path.to_path_buf())));
    }
    if let Some(path) = find_upwards(start) {
        return Ok((load(&path)?, ConfigSource::Project(path)));
    }
    if let Some(path) = user.filter(|p| p.is_file()) {
        return Ok((load(path)?, ConfigSource::User(path.to_path_buf())));
    }
    Ok((RuntimeConfig::default(), ConfigSource::Defaults))
}

fn find_upwards(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(FILE_NAME))
        .find(|candidate| candidate.is_file())
}

fn load(path: &Path) -> anyhow::Result<RuntimeConfig> {
    RuntimeConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_wins() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("alt.toml");
        std::fs::write(&explicit, "[canvas]\nid = \"stage\"\n").unwrap();
        std::fs::write(dir.path().join(FILE_NAME), "[canvas]\nid = \"other\"\n").unwrap();

        let (config, source) = resolve_from(Some(&explicit), dir.path(), None).unwrap();
        assert_eq!(config.canvas.id, "stage");
        assert_eq!(source, ConfigSource::Explicit(explicit));
    }

    #[test]
    fn test_walks_up_to_project_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FILE_NAME), "[canvas]\nwidth = 640\n").unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, source) = resolve_from(None, &nested, None).unwrap();
        assert_eq!(config.canvas.width, 640);
        assert_eq!(source, ConfigSource::Project(dir.path().join(FILE_NAME)));
    }

    #[test]
    fn test_user_file_then_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("project");
        std::fs::create_dir_all(&nested).unwrap();
        let user = dir.path().join("user.toml");

        let (config, source) = resolve_from(None, &nested, Some(&user)).unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(source, ConfigSource::Defaults);

        std::fs::write(&user, "[console]\ncapacity = 8\n").unwrap();
        let (config, source) = resolve_from(None, &nested, Some(&user)).unwrap();
        assert_eq!(config.console.capacity, 8);
        assert_eq!(source, ConfigSource::User(user));
    }

    #[test]
    fn test_bad_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        std::fs::write(&path, "[heap]\nreserved_slots = \"many\"\n").unwrap();
        let err = resolve_from(None, dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("hostlink.toml"));
    }
}
