use crate::model::{validate_app_config, AppConfig};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "forms-tui.yaml";
pub const CONFIG_DIR_ENV: &str = "FORMS_TUI_CONFIG_DIR";

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: AppConfig,
    /// Directory relative store paths resolve against.
    pub base_dir: PathBuf,
    /// File the config came from; `None` when running on defaults.
    pub source: Option<PathBuf>,
}

impl LoadedConfig {
    pub fn database_path(&self) -> Result<PathBuf> {
        resolve_path(&self.base_dir, &self.config.database)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        resolve_path(&self.base_dir, &self.config.data_dir)
    }

    pub fn log_path(&self) -> Result<Option<PathBuf>> {
        match &self.config.log_file {
            Some(p) => Ok(Some(resolve_path(&self.base_dir, p)?)),
            None => Ok(None),
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let cfg: AppConfig =
        serde_yaml::from_str(&s).with_context(|| format!("parsing {path:?}"))?;
    validate_app_config(&cfg).map_err(|e| anyhow!("invalid config {path:?}: {e}"))?;
    Ok(cfg)
}

fn loaded_from(path: &Path, fallback_dir: &Path) -> Result<LoadedConfig> {
    let config = read_config(path)?;
    Ok(LoadedConfig {
        config,
        base_dir: path.parent().unwrap_or(fallback_dir).to_path_buf(),
        source: Some(path.to_path_buf()),
    })
}

/// Find `forms-tui.yaml`: explicit dir, then CWD and CWD/.tui, then
/// ancestor `.tui` dirs, then `~/.tui`. Falls back to defaults anchored at CWD.
pub fn discover_config(
    cwd: &Path,
    explicit_dir: Option<PathBuf>,
    home: Option<PathBuf>,
) -> Result<LoadedConfig> {
    if let Some(dir) = explicit_dir {
        let entry = dir.join(CONFIG_FILE);
        if entry.exists() {
            return loaded_from(&entry, &dir);
        }
        // Explicit dir without a file still anchors the stores.
        return Ok(LoadedConfig {
            config: AppConfig::default(),
            base_dir: dir,
            source: None,
        });
    }
    let candidates = [cwd.join(CONFIG_FILE), cwd.join(".tui").join(CONFIG_FILE)];
    for p in &candidates {
        if p.exists() {
            return loaded_from(p, cwd);
        }
    }
    let mut cur = cwd;
    while let Some(parent) = cur.parent() {
        let p = parent.join(".tui").join(CONFIG_FILE);
        if p.exists() {
            return loaded_from(&p, parent);
        }
        cur = parent;
    }
    if let Some(home) = home {
        let p = home.join(".tui").join(CONFIG_FILE);
        if p.exists() {
            return loaded_from(&p, &home);
        }
    }
    Ok(LoadedConfig {
        config: AppConfig::default(),
        base_dir: cwd.to_path_buf(),
        source: None,
    })
}

pub fn load_config() -> Result<LoadedConfig> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let explicit = std::env::var(CONFIG_DIR_ENV).ok().map(PathBuf::from);
    let home = std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .map(PathBuf::from);
    discover_config(&cwd, explicit, home)
}

/// Expand `${VAR}` references; unknown variables expand to "".
pub fn expand_env_with(raw: &str, env_map: &HashMap<String, String>) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Za-z0-9_]+)\}")?;
    Ok(re
        .replace_all(raw, |caps: &regex::Captures| {
            env_map.get(&caps[1]).cloned().unwrap_or_default()
        })
        .to_string())
}

pub fn resolve_path(base_dir: &Path, raw: &str) -> Result<PathBuf> {
    let env_map: HashMap<String, String> = std::env::vars().collect();
    let expanded = expand_env_with(raw, &env_map)?;
    let p = PathBuf::from(expanded);
    Ok(if p.is_absolute() { p } else { base_dir.join(p) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_known_and_blanks_unknown_vars() {
        let mut env = HashMap::new();
        env.insert("APP_HOME".to_string(), "/srv/forms".to_string());
        assert_eq!(
            expand_env_with("${APP_HOME}/data/${NOPE}x", &env).unwrap(),
            "/srv/forms/data/x"
        );
        assert_eq!(expand_env_with("plain", &env).unwrap(), "plain");
    }

    #[test]
    fn explicit_dir_wins_and_anchors_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "title: Office\ndatabase: db/forms.db\n",
        )
        .unwrap();
        let other = tempfile::tempdir().unwrap();
        let loaded =
            discover_config(other.path(), Some(dir.path().to_path_buf()), None).unwrap();
        assert_eq!(loaded.config.title, "Office");
        assert_eq!(
            loaded.database_path().unwrap(),
            dir.path().join("db").join("forms.db")
        );
        assert_eq!(loaded.data_dir().unwrap(), dir.path().join("data"));
    }

    #[test]
    fn ancestor_tui_dir_is_discovered() {
        let root = tempfile::tempdir().unwrap();
        let tui = root.path().join(".tui");
        fs::create_dir_all(&tui).unwrap();
        fs::write(tui.join(CONFIG_FILE), "data_dir: rows\n").unwrap();
        let deep = root.path().join("a").join("b");
        fs::create_dir_all(&deep).unwrap();
        let loaded = discover_config(&deep, None, None).unwrap();
        assert_eq!(loaded.source.as_deref(), Some(tui.join(CONFIG_FILE).as_path()));
        assert_eq!(loaded.data_dir().unwrap(), tui.join("rows"));
    }

    #[test]
    fn defaults_when_nothing_found() {
        let root = tempfile::tempdir().unwrap();
        let loaded = discover_config(root.path(), None, None).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.base_dir, root.path());
        assert_eq!(loaded.config.database, "forms.db");
    }

    #[test]
    fn invalid_config_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join(CONFIG_FILE), "theme: neon\n").unwrap();
        let err = discover_config(root.path(), None, None).unwrap_err();
        assert!(format!("{err:#}").contains("unknown theme"));
    }
}
