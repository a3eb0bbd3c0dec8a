use crate::model::Rules;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Overrides the platform data directory for the save files.
    pub data_dir: Option<PathBuf>,
    /// JSON item catalog; the built-in one is used when unset.
    pub catalog_path: Option<PathBuf>,
    pub log_filter: String,
    pub rules: Rules,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            catalog_path: None,
            log_filter: "manulmanor=info".to_string(),
            rules: Rules::default(),
        }
    }
}

pub struct Paths {
    pub store_dir: PathBuf,
    pub settings_path: PathBuf,
}

pub fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "manulmanor", "ManulManor")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).ok();
    Ok(Paths {
        store_dir: dir.join("store"),
        settings_path: proj.config_dir().join("settings.json"),
    })
}

impl Paths {
    /// Applies a settings-level data dir override.
    pub fn with_settings(mut self, settings: &Settings) -> Self {
        if let Some(dir) = &settings.data_dir {
            self.store_dir = dir.clone();
        }
        self
    }
}

pub fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        match serde_json::from_str::<Settings>(&s) {
            Ok(v) => return v,
            Err(e) => tracing::warn!("ignoring unreadable settings {}: {}", path.display(), e),
        }
    }
    Settings::default()
}

pub fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data)?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn atomic_rename(from: &Path, to: &Path) -> std::io::Result<()> {
    // rename() replaces atomically on unix; Windows refuses to overwrite.
    if cfg!(windows) && to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to)
}
