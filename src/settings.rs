use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::{BaseDirs, ProjectDirs};
use inquire::Text;
use serde::{Deserialize, Serialize};
use tracing::warn;

const DEFAULT_DATA_ROOT: &str = "~/Documents/WorkOrders";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocoderSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
}

impl Default for GeocoderSettings {
    fn default() -> Self {
        GeocoderSettings {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: concat!("work-tracker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub data_root: String,
    #[serde(default)]
    pub geocoder: GeocoderSettings,
}

impl AppSettings {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }
}

pub fn get_config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "work-tracker", "app") {
        let config_dir = proj_dirs.config_dir();
        if !config_dir.exists() {
            fs::create_dir_all(config_dir).ok();
        }
        return config_dir.join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

pub fn load_settings_from(path: &Path) -> Option<AppSettings> {
    let content = fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!("ignoring unreadable settings at {}: {}", path.display(), e);
            None
        }
    }
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> anyhow::Result<()> {
    let toml_str = toml::to_string_pretty(settings).context("serializing settings")?;
    fs::write(path, toml_str).with_context(|| format!("writing {}", path.display()))
}

pub fn load_settings() -> Option<AppSettings> {
    load_settings_from(&get_config_path())
}

pub fn setup_config_wizard() -> anyhow::Result<AppSettings> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = load_settings();
    let default_val = current
        .as_ref()
        .map(|s| s.data_root.clone())
        .unwrap_or_else(|| DEFAULT_DATA_ROOT.to_string());

    println!("📂 Opening folder picker...");
    let picked_path = rfd::FileDialog::new().set_title("Select Work Order Data Directory").pick_folder();

    let new_root = if let Some(path) = picked_path {
        path.to_string_lossy().to_string()
    } else {
        println!("❌ No folder selected. Falling back to manual input.");
        Text::new("Enter Data Directory:").with_default(&default_val).prompt()?
    };

    let settings = AppSettings {
        data_root: new_root,
        geocoder: current.map(|s| s.geocoder).unwrap_or_default(),
    };
    save_settings_to(&get_config_path(), &settings)?;
    println!("✅ Settings saved.");
    Ok(settings)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
