use std::{
    path::PathBuf,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
}

/// Process-wide preferences, loaded once and written back on every change.
///
/// Cloning is cheap and every clone sees the same values.
#[derive(Debug, Clone)]
pub struct PreferencesHandle {
    path: PathBuf,
    current: Arc<RwLock<Preferences>>,
}

impl PreferencesHandle {
    /// Read preferences from `path`. A missing or unreadable file means defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "Ignoring unreadable preferences: {e}");
                Preferences::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Could not read preferences: {e}");
                Preferences::default()
            }
        };
        Self {
            path,
            current: Arc::new(RwLock::new(current)),
        }
    }

    pub fn get(&self) -> Preferences {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Change the preferences and persist them. A failed write is logged; the new values
    /// still apply for the rest of the process.
    pub fn update(&self, change: impl FnOnce(&mut Preferences)) -> Preferences {
        let updated = {
            let mut current = self.current.write().unwrap_or_else(|e| e.into_inner());
            change(&mut current);
            *current
        };
        if let Err(e) = self.persist(&updated) {
            tracing::warn!(path = %self.path.display(), "Could not save preferences: {e:#}");
        }
        updated
    }

    fn persist(&self, preferences: &Preferences) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(preferences)?)?;
        Ok(())
    }
}
