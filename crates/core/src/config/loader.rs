//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, Result, ResultExt};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Files probed, in order, when no explicit path is given
pub const CONFIG_CANDIDATES: &[&str] = &[".tasksync-build.toml", ".config/tasksync-build.toml"];

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub schema: ConfigSchema,
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from an explicit path, a standard location, or defaults
    ///
    /// An explicit path that does not exist is an error; a missing file in the
    /// standard locations is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };

        let schema = match &config_path {
            Some(p) => load_config_file(p)?,
            None => {
                tracing::debug!("no configuration file found, using defaults");
                ConfigSchema::default()
            }
        };

        Ok(Self {
            schema,
            path: config_path,
        })
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self {
            schema: toml::from_str(s)?,
            path: None,
        })
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .chain(dirs::config_dir().map(|d| d.join("tasksync").join("build.toml")))
        .find(|candidate| candidate.is_file())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    tracing::debug!(path = %path.display(), "loading configuration");

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!("Failed to read config file {}: {}", path.display(), e))
            .with_source(e)
    })?;

    let schema: ConfigSchema = toml::from_str(&content)
        .map_err(Error::from)
        .context(format!("While reading {}", path.display()))?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropertyValue;
    use crate::error::ErrorCode;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.path.is_none());
        assert_eq!(config.schema.flutter.min_sdk_version, 21);
        assert_eq!(config.schema.validation.supported_java_versions, vec![8, 11, 17, 21]);
        assert_eq!(
            config.schema.general.descriptor_path(),
            PathBuf::from("android/app/build.gradle.kts")
        );
    }

    #[test]
    fn test_config_from_str_partial() {
        let config: Config = r#"
            [flutter]
            min_sdk_version = 23

            [properties]
            "flutter.versionName" = "2.1.0"
            "app.flavorCount" = 3

            [validation]
            allowed_groups = ["com.google.firebase"]
        "#
        .parse()
        .unwrap();

        assert_eq!(config.schema.flutter.min_sdk_version, 23);
        assert_eq!(config.schema.flutter.compile_sdk_version, 35);
        assert_eq!(
            config.schema.properties.get("flutter.versionName"),
            Some(&PropertyValue::String("2.1.0".into()))
        );
        assert_eq!(
            config.schema.properties.get("app.flavorCount"),
            Some(&PropertyValue::Integer(3))
        );
        assert!(config.schema.validation.require_application_plugin);
    }

    #[test]
    fn test_config_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.toml");
        std::fs::write(&path, "[general]\nandroid_dir = \"mobile/android\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.path.as_deref(), Some(path.as_path()));
        assert_eq!(config.schema.general.android_dir, PathBuf::from("mobile/android"));
    }

    #[test]
    fn test_config_load_missing_explicit_file() {
        let err = Config::load(Some(Path::new("/nonexistent/tasksync.toml"))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigNotFound);
    }

    #[test]
    fn test_config_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.toml");
        std::fs::write(&path, "[flutter\nmin_sdk_version = 1").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigParseError);
        assert!(err.context.is_some());
    }
}
