//! App registry: short app keys mapped to launch targets, persisted as pretty JSON.
//!
//! Loading never fails. A missing file is created with the platform defaults, a corrupt
//! file is logged and replaced in memory by the defaults, and an existing file is merged
//! with the defaults (user keys win). The file is written only on creation or on an
//! explicit [`AppRegistry::insert`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::{error, info, warn};

use crate::error::{AegisError, AegisResult};

/// Built-in launch targets for the current platform.
pub fn default_apps() -> BTreeMap<String, String> {
    platform_defaults()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

#[cfg(target_os = "windows")]
fn platform_defaults() -> Vec<(&'static str, String)> {
    let local = std::env::var("LOCALAPPDATA").unwrap_or_default();
    let roaming = std::env::var("APPDATA").unwrap_or_default();
    vec![
        ("whatsapp", format!(r"{local}\WhatsApp\WhatsApp.exe")),
        ("chrome", r"C:\Program Files\Google\Chrome\Application\chrome.exe".to_string()),
        ("calculator", "calc.exe".to_string()),
        ("notepad", "notepad.exe".to_string()),
        ("spotify", format!(r"{roaming}\Spotify\Spotify.exe")),
    ]
}

#[cfg(target_os = "macos")]
fn platform_defaults() -> Vec<(&'static str, String)> {
    vec![
        ("whatsapp", "/Applications/WhatsApp.app".to_string()),
        ("chrome", "/Applications/Google Chrome.app".to_string()),
        ("calculator", "/System/Applications/Calculator.app".to_string()),
        ("notepad", "/System/Applications/TextEdit.app".to_string()),
        ("spotify", "/Applications/Spotify.app".to_string()),
    ]
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn platform_defaults() -> Vec<(&'static str, String)> {
    vec![
        ("whatsapp", "whatsapp-for-linux".to_string()),
        ("chrome", "google-chrome".to_string()),
        ("calculator", "gnome-calculator".to_string()),
        ("notepad", "gedit".to_string()),
        ("spotify", "spotify".to_string()),
    ]
}

pub struct AppRegistry {
    path: PathBuf,
    apps: RwLock<BTreeMap<String, String>>,
}

impl AppRegistry {
    /// Load `path`, creating it with the defaults when absent. An unreadable file is copied
    /// to `<path>.bak` and the defaults are used.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let defaults = default_apps();

        let apps = if path.exists() {
            match read_apps(&path) {
                Ok(mut apps) => {
                    for (key, target) in defaults {
                        apps.entry(key).or_insert(target);
                    }
                    info!(target: "aegis::registry", path = %path.display(), apps = apps.len(), "app registry loaded");
                    apps
                }
                Err(e) => {
                    error!(target: "aegis::registry", path = %path.display(), error = %e, "Error loading app registry; using defaults");
                    // The next insert rewrites `path`.
                    let backup = backup_path(&path);
                    match std::fs::copy(&path, &backup) {
                        Ok(_) => warn!(target: "aegis::registry", backup = %backup.display(), "unreadable app registry backed up"),
                        Err(e) => error!(target: "aegis::registry", backup = %backup.display(), error = %e, "Failed to back up app registry"),
                    }
                    defaults
                }
            }
        } else {
            if let Err(e) = write_apps(&path, &defaults) {
                error!(target: "aegis::registry", path = %path.display(), error = %e, "Failed to create app registry");
            } else {
                info!(target: "aegis::registry", path = %path.display(), "app registry created with defaults");
            }
            defaults
        };

        Self {
            path,
            apps: RwLock::new(apps),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Known app keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.apps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.apps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Fuzzy lookup: the first key (alphabetically) that is contained in `name`, or that
    /// contains `name` once spaces are removed from both. Returns `(key, target)`.
    pub fn resolve(&self, name: &str) -> Option<(String, String)> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        let compact = name.replace(' ', "");
        self.apps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(key, _)| name.contains(key.as_str()) || key.replace(' ', "").contains(&compact))
            .map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Register or override `name` and persist the whole registry.
    pub fn insert(&self, name: &str, target: &str) -> AegisResult<()> {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return Err(AegisError::Registry("app name must not be empty".into()));
        }
        let snapshot = {
            let mut apps = self.apps.write().unwrap_or_else(PoisonError::into_inner);
            apps.insert(key.clone(), target.trim().to_string());
            apps.clone()
        };
        write_apps(&self.path, &snapshot)?;
        info!(target: "aegis::registry", app = %key, "app registered");
        Ok(())
    }
}

/// `apps.json` → `apps.json.bak`.
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

fn read_apps(path: &Path) -> AegisResult<BTreeMap<String, String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn write_apps(path: &Path, apps: &BTreeMap<String, String>) -> AegisResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(apps)?)?;
    Ok(())
}
