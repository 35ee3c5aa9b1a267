use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use once_cell::sync::Lazy;

use crate::context::SoftBreakMode;

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = ".inkline_settings.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_theme")]
    pub theme: String,

    #[serde(default)]
    pub soft_break: SoftBreakMode,

    /// Overrides the detected flow-wrap capability when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_wrap: Option<bool>,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

fn default_theme() -> String {
    "Oceanic Next".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            theme: default_theme(),
            soft_break: SoftBreakMode::default(),
            flow_wrap: None,
        }
    }
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

fn settings_path() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join(SETTINGS_FILENAME))
}

pub fn load_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine home directory, using default settings");
        return;
    };

    if !path.exists() {
        info!(
            "Settings file not found at {:?}, creating with defaults",
            path
        );
        if let Ok(settings) = SETTINGS.read() {
            save_settings_to_file(&settings, &path);
        }
        return;
    }

    if let Some(mut settings) = load_settings_from_file(&path) {
        debug!("Loaded settings from {:?}", path);

        // Run migrations if needed
        if settings.version < CURRENT_VERSION {
            migrate_settings(&mut settings);
            save_settings_to_file(&settings, &path);
        }

        if let Ok(mut global) = SETTINGS.write() {
            *global = settings;
        }
    }
}

fn load_settings_from_file(path: &Path) -> Option<Settings> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_yaml::from_str::<Settings>(&content) {
            Ok(settings) => Some(settings),
            Err(e) => {
                error!("Failed to parse settings file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            error!("Failed to read settings file {:?}: {}", path, e);
            None
        }
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

pub fn save_settings() {
    let Some(path) = settings_path() else {
        warn!("Could not determine home directory, cannot save settings");
        return;
    };

    if let Ok(settings) = SETTINGS.read() {
        save_settings_to_file(&settings, &path);
    }
}

fn save_settings_to_file(settings: &Settings, path: &Path) {
    let content = generate_settings_yaml(settings);

    match fs::write(path, content) {
        Ok(()) => debug!("Saved settings to {:?}", path),
        Err(e) => error!("Failed to save settings to {:?}: {}", path, e),
    }
}

fn generate_settings_yaml(settings: &Settings) -> String {
    let mut content = String::new();

    content.push_str(SETTINGS_TEMPLATE);
    content.push_str(&format!("version: {}\n", settings.version));
    content.push_str(&format!("theme: \"{}\"\n", settings.theme));
    content.push_str(&format!(
        "soft_break: {}\n",
        match settings.soft_break {
            SoftBreakMode::Space => "space",
            SoftBreakMode::LineBreak => "line_break",
        }
    ));
    if let Some(flow_wrap) = settings.flow_wrap {
        content.push_str(&format!("flow_wrap: {}\n", flow_wrap));
    }

    content
}

const SETTINGS_TEMPLATE: &str = r#"# ============================================================================
# inkline settings
# ============================================================================
# theme:      color palette name ("Oceanic Next" or "Kanagawa")
# soft_break: how soft breaks render, "space" or "line_break"
# flow_wrap:  uncomment to override the detected flow-wrap capability
#             (true lets tappable images reflow, false stacks them in a row)
#
# flow_wrap: true

"#;

// Public API for accessing/modifying settings

pub fn get_theme_name() -> String {
    SETTINGS
        .read()
        .map(|s| s.theme.clone())
        .unwrap_or_else(|_| default_theme())
}

pub fn set_theme_name(name: &str) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.theme = name.to_string();
    }
    save_settings();
}

pub fn get_soft_break() -> SoftBreakMode {
    SETTINGS
        .read()
        .map(|s| s.soft_break)
        .unwrap_or_default()
}

pub fn set_soft_break(mode: SoftBreakMode) {
    if let Ok(mut settings) = SETTINGS.write() {
        settings.soft_break = mode;
    }
    save_settings();
}

pub fn get_flow_wrap_override() -> Option<bool> {
    SETTINGS.read().map(|s| s.flow_wrap).unwrap_or(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);

        let settings = Settings {
            version: CURRENT_VERSION,
            theme: "Kanagawa".to_string(),
            soft_break: SoftBreakMode::LineBreak,
            flow_wrap: Some(false),
        };
        save_settings_to_file(&settings, &path);

        let loaded = load_settings_from_file(&path).unwrap();
        assert_eq!(loaded.theme, "Kanagawa");
        assert_eq!(loaded.soft_break, SoftBreakMode::LineBreak);
        assert_eq!(loaded.flow_wrap, Some(false));
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let settings: Settings = serde_yaml::from_str("theme: \"Kanagawa\"\n").unwrap();
        assert_eq!(settings.version, CURRENT_VERSION);
        assert_eq!(settings.soft_break, SoftBreakMode::Space);
        assert_eq!(settings.flow_wrap, None);
    }
}
