// File-backed configuration store

use crate::error::CoreError;
use crate::settings::Settings;
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Holds the live [`Settings`] and rewrites the whole file on every change.
#[derive(Debug)]
pub struct ConfigStore {
    path: Option<PathBuf>,
    settings: RwLock<Settings>,
}

impl ConfigStore {
    /// Load settings from `path`. A missing file yields defaults; the file is
    /// created on the first update.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let settings = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Loading config from {:?}", path);
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| CoreError::Io(format!("Failed to read {:?}: {}", path, e)))?;
            Settings::from_json(&raw)?
        } else {
            info!("Config file {:?} not found, starting from defaults", path);
            Settings::default()
        };
        settings.validate()?;
        Ok(Self {
            path: Some(path),
            settings: RwLock::new(settings),
        })
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            settings: RwLock::new(settings),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn snapshot(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Apply `mutate` to a copy of the settings, validate and persist it,
    /// then publish it. On any failure the live settings are left unchanged.
    pub async fn update<F>(&self, mutate: F) -> Result<Settings, CoreError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut live = self.settings.write().await;
        let mut candidate = live.clone();
        mutate(&mut candidate);
        candidate.validate()?;
        if let Some(path) = &self.path {
            write_settings(path, &candidate).await?;
        }
        *live = candidate.clone();
        Ok(candidate)
    }
}

async fn write_settings(path: &Path, settings: &Settings) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::Io(format!("Failed to create directory: {}", e)))?;
        }
    }
    let json = settings.to_json_pretty()?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| CoreError::Io(format!("Failed to write {:?}: {}", tmp, e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| CoreError::Io(format!("Failed to replace {:?}: {}", path, e)))?;
    debug!("Config saved to {:?}", path);
    Ok(())
}
