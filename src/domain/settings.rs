use crate::domain::models::QuickNote;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "g1_link".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Persisted user-facing settings mirrored to (or consumed by) the glasses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Display brightness, 0–63 on the wire.
    #[serde(default = "default_brightness")]
    pub brightness: u8,
    #[serde(default = "default_false")]
    pub auto_brightness: bool,
    #[serde(default = "default_false")]
    pub silent_mode: bool,

    /// When enabled the AI trigger timeout is suppressed and the mic stays
    /// open until an explicit stop.
    #[serde(default = "default_false")]
    pub continuous_listening: bool,

    // Dashboard geometry
    #[serde(default)]
    pub dashboard_mode: u8,
    #[serde(default)]
    pub dashboard_height: u8,
    #[serde(default = "default_dashboard_distance")]
    pub dashboard_distance: u8,
    #[serde(default = "default_dashboard_tilt")]
    pub dashboard_tilt: u8,

    // Time/weather formatting for the dashboard frame
    #[serde(default = "default_false")]
    pub use_fahrenheit: bool,
    #[serde(default = "default_false")]
    pub use_24_hour: bool,
    #[serde(default = "default_false")]
    pub weather_enabled: bool,

    /// Mirrored quick notes, at most four.
    #[serde(default)]
    pub quick_notes: Vec<QuickNote>,

    // Translation language pair (wire codes, see protocol::TranslateLanguage)
    #[serde(default = "default_language")]
    pub translate_source: u8,
    #[serde(default = "default_language")]
    pub translate_target: u8,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
            auto_brightness: false,
            silent_mode: false,
            continuous_listening: false,
            dashboard_mode: 0,
            dashboard_height: 0,
            dashboard_distance: default_dashboard_distance(),
            dashboard_tilt: default_dashboard_tilt(),
            use_fahrenheit: false,
            use_24_hour: false,
            weather_enabled: false,
            quick_notes: Vec::new(),
            translate_source: default_language(),
            translate_target: default_language(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_brightness() -> u8 {
    32
}
fn default_dashboard_distance() -> u8 {
    4 // metres
}
fn default_dashboard_tilt() -> u8 {
    30 // degrees
}
fn default_language() -> u8 {
    0x02 // english
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::with_path(settings_path))
    }

    /// Build a service over an explicit file path (used by tests).
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("G1Link");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut service = SettingsService::with_path(path.clone());
        service.get_mut().brightness = 50;
        service.get_mut().continuous_listening = true;
        service.save().unwrap();

        let reloaded = SettingsService::with_path(path);
        assert_eq!(reloaded.get().brightness, 50);
        assert!(reloaded.get().continuous_listening);
        assert_eq!(reloaded.get().dashboard_distance, 4);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = SettingsService::with_path(dir.path().join("absent.json"));
        assert_eq!(service.get().brightness, 32);
        assert!(!service.get().silent_mode);
        assert!(service.get().quick_notes.is_empty());
    }
}
