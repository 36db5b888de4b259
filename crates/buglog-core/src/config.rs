use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Location of the project config, relative to the repository root.
pub const PROJECT_CONFIG_PATH: &str = ".buglog/config.toml";

/// Defaults offered when prompting for a new identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub user: UserDefaults,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub user: UserDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_output: String,
}

impl EffectiveConfig {
    /// Identity prompt defaults: project values win over user values.
    #[must_use]
    pub fn identity_defaults(&self) -> UserDefaults {
        UserDefaults {
            name: self
                .project
                .user
                .name
                .clone()
                .or_else(|| self.user.user.name.clone()),
            email: self
                .project
                .user
                .email
                .clone()
                .or_else(|| self.user.user.email.clone()),
        }
    }
}

fn load_toml<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<T>(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `.buglog/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    load_toml(&project_root.join(PROJECT_CONFIG_PATH))
}

/// Path of the per-user config file, if the platform has a config dir.
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("buglog").join("config.toml"))
}

/// Load the per-user config, or defaults if absent.
///
/// # Errors
///
/// Fails if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    match user_config_path() {
        Some(path) => load_toml(&path),
        None => Ok(UserConfig::default()),
    }
}

/// Write a default project config unless one already exists.
///
/// # Errors
///
/// Fails if the file cannot be serialized or written.
pub fn write_default_project_config(project_root: &Path) -> Result<()> {
    let path = project_root.join(PROJECT_CONFIG_PATH);
    if path.exists() {
        return Ok(());
    }
    let content = toml::to_string_pretty(&ProjectConfig::default())
        .context("Failed to serialize default config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Load both config files and resolve the output mode.
///
/// # Errors
///
/// Fails if either config file is present but invalid.
pub fn resolve_config(
    project_root: Option<&Path>,
    cli_output: Option<&str>,
) -> Result<EffectiveConfig> {
    let project = match project_root {
        Some(root) => load_project_config(root)?,
        None => ProjectConfig::default(),
    };
    let user = load_user_config()?;

    let env_format = env::var("FORMAT").ok();
    let resolved_output = resolve_output(
        cli_output,
        env_format.as_deref(),
        project.output.as_deref(),
        user.output.as_deref(),
        std::io::stdout().is_terminal(),
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_output,
    })
}

fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

/// Precedence: CLI flag, `FORMAT` env, project config, user config, TTY.
fn resolve_output(
    cli: Option<&str>,
    env_format: Option<&str>,
    project: Option<&str>,
    user: Option<&str>,
    is_tty: bool,
) -> String {
    [cli, env_format, project, user]
        .into_iter()
        .flatten()
        .find_map(normalize_output_mode)
        .unwrap_or(if is_tty { "pretty" } else { "text" })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_project_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_project_config(dir.path()).expect("load should succeed");
        assert_eq!(cfg, ProjectConfig::default());
    }

    #[test]
    fn project_config_parses_user_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".buglog")).expect("mkdir");
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_PATH),
            "output = \"json\"\n\n[user]\nname = \"Alice\"\nemail = \"alice@example.com\"\n",
        )
        .expect("write");

        let cfg = load_project_config(dir.path()).expect("load");
        assert_eq!(cfg.output.as_deref(), Some("json"));
        assert_eq!(cfg.user.name.as_deref(), Some("Alice"));
        assert_eq!(cfg.user.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".buglog")).expect("mkdir");
        std::fs::write(dir.path().join(PROJECT_CONFIG_PATH), "output = [").expect("write");

        let err = load_project_config(dir.path()).expect_err("should fail");
        assert!(format!("{err}").contains("config.toml"));
    }

    #[test]
    fn default_config_is_written_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join(".buglog")).expect("mkdir");
        write_default_project_config(dir.path()).expect("write");
        std::fs::write(dir.path().join(PROJECT_CONFIG_PATH), "output = \"json\"\n").expect("edit");
        write_default_project_config(dir.path()).expect("second write is a no-op");
        let cfg = load_project_config(dir.path()).expect("load");
        assert_eq!(cfg.output.as_deref(), Some("json"));
    }

    #[test]
    fn output_precedence() {
        assert_eq!(resolve_output(Some("json"), Some("text"), Some("pretty"), None, true), "json");
        assert_eq!(resolve_output(None, Some("text"), Some("json"), None, true), "text");
        assert_eq!(resolve_output(None, None, Some("json"), Some("text"), true), "json");
        assert_eq!(resolve_output(None, None, None, Some("text"), true), "text");
        assert_eq!(resolve_output(None, None, None, None, true), "pretty");
        assert_eq!(resolve_output(None, None, None, None, false), "text");
    }

    #[test]
    fn unknown_modes_fall_through() {
        assert_eq!(resolve_output(None, Some("yaml"), Some("human"), None, false), "pretty");
    }

    #[test]
    fn identity_defaults_prefer_project() {
        let cfg = EffectiveConfig {
            project: ProjectConfig {
                output: None,
                user: UserDefaults {
                    name: Some("Project Name".into()),
                    email: None,
                },
            },
            user: UserConfig {
                output: None,
                user: UserDefaults {
                    name: Some("User Name".into()),
                    email: Some("user@example.com".into()),
                },
            },
            resolved_output: "text".into(),
        };
        let defaults = cfg.identity_defaults();
        assert_eq!(defaults.name.as_deref(), Some("Project Name"));
        assert_eq!(defaults.email.as_deref(), Some("user@example.com"));
    }
}
