use std::path::{Path, PathBuf};

use serde::Deserialize;

fn default_listen_address() -> String {
    "0.0.0.0:19132".into()
}

fn default_true() -> bool {
    true
}

fn default_forced_packs_dir() -> PathBuf {
    "forcedpacks".into()
}

fn default_worlds_dir() -> PathBuf {
    "worlds".into()
}

fn default_resume_radius() -> i32 {
    3
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub proxy: ProxySection,
    #[serde(default)]
    pub worlds: WorldsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
pub struct ProxySection {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_true")]
    pub with_client: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub extra_debug: bool,
    #[serde(default)]
    pub capture: bool,
    #[serde(default = "default_forced_packs_dir")]
    pub forced_packs_dir: PathBuf,
}

impl Default for ProxySection {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            with_client: true,
            debug: false,
            extra_debug: false,
            capture: false,
            forced_packs_dir: default_forced_packs_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WorldsSection {
    #[serde(default = "default_worlds_dir")]
    pub base_dir: PathBuf,
    #[serde(default)]
    pub exclude_mobs: Vec<String>,
    #[serde(default)]
    pub void_gen: bool,
    #[serde(default)]
    pub render_maps: bool,
    #[serde(default = "default_resume_radius")]
    pub resume_radius: i32,
}

impl Default for WorldsSection {
    fn default() -> Self {
        Self {
            base_dir: default_worlds_dir(),
            exclude_mobs: Vec::new(),
            void_gen: false,
            render_maps: false,
            resume_radius: default_resume_radius(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CliConfig {
    /// Load `proxy.toml` when present; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}
