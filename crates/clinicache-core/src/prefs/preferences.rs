use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::error;

use super::backend::KeyValueBackend;
use super::error::{PrefsError, Result};

const USER_PREFERENCES_KEY: &str = "hospital_user_preferences";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FontSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
        }
    }
}

impl std::fmt::Display for FontSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(other.to_string()),
        }
    }
}

impl FromStr for FontSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(FontSize::Small),
            "medium" => Ok(FontSize::Medium),
            "large" => Ok(FontSize::Large),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserPreferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(rename = "fontSize", default)]
    pub font_size: FontSize,
    #[serde(default = "default_notifications")]
    pub notifications: bool,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_notifications() -> bool {
    true
}

fn default_language() -> String {
    "es".to_string()
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            font_size: FontSize::default(),
            notifications: default_notifications(),
            language: default_language(),
        }
    }
}

impl UserPreferences {
    /// Set one preference from its textual form, e.g. `("theme", "dark")`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || PrefsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "theme" => self.theme = value.parse().map_err(|_| invalid())?,
            "fontSize" | "font_size" | "font-size" => {
                self.font_size = value.parse().map_err(|_| invalid())?
            }
            "notifications" => {
                self.notifications = match value.trim().to_ascii_lowercase().as_str() {
                    "true" | "on" | "yes" | "1" => true,
                    "false" | "off" | "no" | "0" => false,
                    _ => return Err(invalid()),
                }
            }
            "language" => {
                let language = value.trim();
                if language.is_empty() {
                    return Err(invalid());
                }
                self.language = language.to_string();
            }
            other => return Err(PrefsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

pub struct PreferencesService<B> {
    backend: B,
}

impl<B: KeyValueBackend> PreferencesService<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Stored preferences, or defaults if missing or unreadable.
    pub fn get(&self) -> UserPreferences {
        let stored = match self.backend.get_item(USER_PREFERENCES_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return UserPreferences::default(),
            Err(e) => {
                error!(error = %e, "Failed to read preferences");
                return UserPreferences::default();
            }
        };

        serde_json::from_str(&stored).unwrap_or_else(|e| {
            error!(error = %e, "Stored preferences are invalid, using defaults");
            UserPreferences::default()
        })
    }

    pub fn save(&self, preferences: &UserPreferences) -> Result<()> {
        let json = serde_json::to_string(preferences)?;
        self.backend
            .set_item(USER_PREFERENCES_KEY, &json)
            .inspect_err(|e| error!(error = %e, "Failed to save preferences"))
    }

    /// Overwrite the stored preferences with defaults and return them.
    pub fn reset(&self) -> Result<UserPreferences> {
        let defaults = UserPreferences::default();
        self.save(&defaults)?;
        Ok(defaults)
    }

    /// Load, change one key, save. Returns the saved preferences.
    pub fn update(&self, key: &str, value: &str) -> Result<UserPreferences> {
        let mut preferences = self.get();
        preferences.set(key, value)?;
        self.save(&preferences)?;
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryBackend;

    #[test]
    fn test_defaults_when_missing() {
        let service = PreferencesService::new(MemoryBackend::new());
        let preferences = service.get();
        assert_eq!(preferences.theme, Theme::Light);
        assert_eq!(preferences.font_size, FontSize::Medium);
        assert!(preferences.notifications);
        assert_eq!(preferences.language, "es");
    }

    #[test]
    fn test_defaults_when_corrupt() {
        let backend = MemoryBackend::new();
        backend.set_item(USER_PREFERENCES_KEY, "{oops").unwrap();
        let service = PreferencesService::new(backend);
        assert_eq!(service.get(), UserPreferences::default());
    }

    #[test]
    fn test_save_then_get() {
        let service = PreferencesService::new(MemoryBackend::new());
        let preferences = UserPreferences {
            theme: Theme::Dark,
            font_size: FontSize::Large,
            notifications: false,
            language: "en".to_string(),
        };
        service.save(&preferences).unwrap();
        assert_eq!(service.get(), preferences);
    }

    #[test]
    fn test_stored_format_uses_client_keys() {
        let backend = MemoryBackend::new();
        let service = PreferencesService::new(backend);
        service.save(&UserPreferences::default()).unwrap();

        let json = service.backend.get_item(USER_PREFERENCES_KEY).unwrap().unwrap();
        assert_eq!(
            json,
            r#"{"theme":"light","fontSize":"medium","notifications":true,"language":"es"}"#
        );
    }

    #[test]
    fn test_partial_stored_object_fills_defaults() {
        let backend = MemoryBackend::new();
        backend.set_item(USER_PREFERENCES_KEY, r#"{"theme":"dark"}"#).unwrap();
        let preferences = PreferencesService::new(backend).get();
        assert_eq!(preferences.theme, Theme::Dark);
        assert_eq!(preferences.language, "es");
    }

    #[test]
    fn test_update_and_reset() {
        let service = PreferencesService::new(MemoryBackend::new());
        let updated = service.update("fontSize", "small").unwrap();
        assert_eq!(updated.font_size, FontSize::Small);
        assert_eq!(service.get().font_size, FontSize::Small);

        assert!(matches!(
            service.update("theme", "solarized"),
            Err(PrefsError::InvalidValue { .. })
        ));
        assert!(matches!(
            service.update("volume", "11"),
            Err(PrefsError::UnknownKey(_))
        ));

        service.reset().unwrap();
        assert_eq!(service.get(), UserPreferences::default());
    }

    #[test]
    fn test_save_failure_is_reported() {
        let service = PreferencesService::new(MemoryBackend::with_quota(8));
        let err = service.save(&UserPreferences::default()).unwrap_err();
        assert!(matches!(err, PrefsError::QuotaExceeded { .. }));
        // Reads still work and fall back to defaults
        assert_eq!(service.get(), UserPreferences::default());
    }
}
