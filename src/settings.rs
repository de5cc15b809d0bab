// src/settings.rs
//
// Persisted front-end settings. The playback engine never reads or writes
// this file; front ends load it at startup and feed the values in as
// configuration, then save any values the user tuned.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReaderSettings {
    #[serde(default = "default_wpm")]
    pub wpm: u32,
    #[serde(default = "default_words_per_step")]
    pub words_per_step: usize,
    #[serde(default = "default_last_directory")]
    pub last_directory: String,
    #[serde(default = "default_theme")]
    pub theme: String, // "light" | "dark"
    #[serde(default)]
    pub font_size_offset: i32,
}

fn default_wpm() -> u32 {
    250
}
fn default_words_per_step() -> usize {
    1
}
fn default_last_directory() -> String {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .to_string_lossy()
        .to_string()
}
fn default_theme() -> String {
    "light".to_string()
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            wpm: default_wpm(),
            words_per_step: default_words_per_step(),
            last_directory: default_last_directory(),
            theme: default_theme(),
            font_size_offset: 0,
        }
    }
}

fn settings_path() -> Result<PathBuf, String> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| "Failed to resolve config directory".to_string())?
        .join("flashread");

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| format!("Failed to create config dir: {}", e))?;

    Ok(config_dir.join("settings.json"))
}

pub fn load_settings() -> Result<ReaderSettings, String> {
    let path = settings_path()?;

    if path.exists() {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings: {}", e))?;

        serde_json::from_str(&content).map_err(|e| format!("Failed to parse settings: {}", e))
    } else {
        // First run: create default settings
        let settings = ReaderSettings::default();
        save_settings(&settings)?;
        Ok(settings)
    }
}

pub fn save_settings(settings: &ReaderSettings) -> Result<(), String> {
    let path = settings_path()?;

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    std::fs::write(&path, content).map_err(|e| format!("Failed to write settings: {}", e))
}
