//! Arcade feature flags
//!
//! Read from a [`KeyValueStore`] (LocalStorage in the browser); missing or
//! unreadable values fall back to the defaults.

use serde::{Deserialize, Serialize};

use crate::services::KeyValueStore;

/// Global switches shared by every game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcadeSettings {
    /// Games refuse to start outside the native app
    pub require_native_app: bool,
    /// Send anomaly telemetry
    pub enable_error_logging: bool,
    /// Dust bursts in the runner
    pub particles: bool,
}

impl Default for ArcadeSettings {
    fn default() -> Self {
        Self {
            require_native_app: false,
            enable_error_logging: true,
            particles: true,
        }
    }
}

impl ArcadeSettings {
    /// Storage key
    pub const STORAGE_KEY: &'static str = "pocket_arcade_settings";

    /// Read settings from `store`, falling back to the defaults
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let Some(json) = store.get(Self::STORAGE_KEY) else {
            log::info!("Using default settings");
            return Self::default();
        };
        match serde_json::from_str(&json) {
            Ok(settings) => {
                log::info!("Loaded settings from storage");
                settings
            }
            Err(e) => {
                log::warn!("Ignoring unreadable settings: {}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::MemoryStore;

    #[test]
    fn test_missing_fields_use_defaults() {
        let s: ArcadeSettings = serde_json::from_str(r#"{"require_native_app":true}"#).unwrap();
        assert!(s.require_native_app);
        assert!(s.enable_error_logging);
        assert!(s.particles);
    }

    #[test]
    fn test_load_from_store() {
        let mut store = MemoryStore::default();
        assert_eq!(ArcadeSettings::load(&store), ArcadeSettings::default());

        store
            .set(ArcadeSettings::STORAGE_KEY, r#"{"particles":false}"#)
            .unwrap();
        let s = ArcadeSettings::load(&store);
        assert!(!s.particles);
        assert!(!s.require_native_app);

        store.set(ArcadeSettings::STORAGE_KEY, "{broken").unwrap();
        assert_eq!(ArcadeSettings::load(&store), ArcadeSettings::default());
    }
}
