use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const PLANCANVAS_DIR: &str = ".plancanvas";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: Option<String>,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f64,
    /// Registry name of the agent every session starts with.
    pub planner: String,
    /// Agent the fixed pipeline hands the plan to.
    pub pipeline_agent: String,
    pub plugins_dir: Option<PathBuf>,
    #[serde(skip)]
    pub workspace_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: None,
            api_key: String::new(),
            base_url: None,
            model: "gpt-4o".to_string(),
            temperature: 1.0,
            planner: "Planner".to_string(),
            pipeline_agent: "DiagramDesigner".to_string(),
            plugins_dir: None,
            workspace_dir: get_plancanvas_dir().join("workspace"),
        }
    }
}

pub fn get_plancanvas_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(PLANCANVAS_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_plancanvas_dir().join("config.toml")
}

pub fn ensure_plancanvas_dir() -> Result<PathBuf> {
    let dir = get_plancanvas_dir();

    if !dir.exists() {
        std::fs::create_dir_all(&dir).with_context(|| {
            format!("Failed to create plancanvas directory at {}", dir.display())
        })?;
    }

    Ok(dir)
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        if config_exists() {
            load_config()
        } else {
            Ok(Config::default())
        }
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.plugins_dir
            .clone()
            .unwrap_or_else(|| self.workspace_dir.join("plugins"))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        config.workspace_dir = get_plancanvas_dir().join("workspace");
        Ok(config)
    }
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path();

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            anyhow::anyhow!(
                "Config file not found. Run 'plancanvas onboard' to set up your configuration."
            )
        } else {
            anyhow::anyhow!("Failed to read config from {}: {}", config_path.display(), e)
        }
    })?;

    Config::from_toml(&content)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_plancanvas_dir()?;

    let config_path = get_config_path();
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(&config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}
