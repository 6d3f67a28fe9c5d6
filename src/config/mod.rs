use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::config::themes::ThemeRegistry;
use crate::model::ResourceKind;
use crate::view::DEFAULT_PAGE_SIZE;

pub mod themes;

pub use themes::Palette;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "StockOverflow";
const APP_NAME: &str = "stocktui";

pub const CONFIG_ENV: &str = "STOCKTUI_CONFIG";
pub const DATA_ENV: &str = "STOCKTUI_DATA";
pub const API_URL_ENV: &str = "STOCKTUI_API_URL";

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn with_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            default_cfg.post_load(env::var(API_URL_ENV).ok());
            self.write_default_config(&AppConfig::default())?;
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(env::var(API_URL_ENV).ok());
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let override_data = env::var(DATA_ENV).ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        let state_dir = project_dirs
            .state_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_root.join("state"));
        let log_dir = state_dir.join("logs");

        Ok(Self {
            config_dir,
            config_file,
            data_dir: data_root,
            cache_dir,
            log_dir,
            state_dir,
        })
    }

    /// Lays every directory out below `root`; used for portable installs and tests.
    pub fn rooted(root: &Path) -> Self {
        let state_dir = root.join("state");
        Self {
            config_dir: root.join("config"),
            config_file: root.join("config").join("config.toml"),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.cache_dir,
            &self.log_dir,
            &self.state_dir,
        ] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub theme: ThemeName,
    pub api: ApiOptions,
    pub view: ViewOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme: ThemeName::Dark,
            api: ApiOptions::default(),
            view: ViewOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, env_api_url: Option<String>) {
        if let Some(url) = env_api_url.filter(|url| !url.trim().is_empty()) {
            self.api.base_url = url;
        }
        if !ThemeRegistry::default().contains(&self.theme) {
            tracing::warn!(?self.theme, "unknown theme in config, falling back to Dark");
            self.theme = ThemeName::Dark;
        }
        if self.view.page_size == 0 {
            tracing::warn!("view.page_size must be positive, using {DEFAULT_PAGE_SIZE}");
            self.view.page_size = DEFAULT_PAGE_SIZE;
        }
    }

    /// Applies command-line overrides, which win over file and environment.
    pub fn apply_overrides(&mut self, api_url: Option<&str>) {
        if let Some(url) = api_url {
            self.api.base_url = url.to_string();
        }
    }

    pub fn palette(&self) -> Palette {
        Palette::for_theme(&self.theme)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiOptions {
    pub base_url: String,
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Honour HTTP(S)_PROXY from the environment.
    pub system_proxy: bool,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_ms: 10_000,
            user_agent: format!("stocktui/{}", env!("CARGO_PKG_VERSION")),
            system_proxy: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    pub page_size: usize,
    pub default_tab: TabName,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            default_tab: TabName::Inventory,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TabName {
    Inventory,
    Users,
    Cars,
    Logs,
}

impl Default for TabName {
    fn default() -> Self {
        TabName::Inventory
    }
}

impl From<TabName> for ResourceKind {
    fn from(tab: TabName) -> Self {
        match tab {
            TabName::Inventory => ResourceKind::Inventory,
            TabName::Users => ResourceKind::Users,
            TabName::Cars => ResourceKind::Cars,
            TabName::Logs => ResourceKind::Logs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, std::hash::Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeName {
    Dark,
    Light,
    HighContrast,
}

impl Default for ThemeName {
    fn default() -> Self {
        ThemeName::Dark
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_default_config() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let loader = ConfigLoader::with_paths(ConfigPaths::rooted(root.path()));
        let cfg = loader.load_or_init()?;
        assert_eq!(cfg.view.page_size, 10);
        assert!(loader.paths().config_file.exists());
        assert!(loader.paths().log_dir.is_dir());

        let written = fs::read_to_string(&loader.paths().config_file)?;
        assert!(written.contains("base_url = \"http://127.0.0.1:8000\""));
        Ok(())
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let paths = ConfigPaths::rooted(root.path());
        paths.ensure_directories()?;
        fs::write(
            &paths.config_file,
            "theme = \"high-contrast\"\n[api]\nbase_url = \"http://stock.local:9000\"\n[view]\npage_size = 0\ndefault_tab = \"cars\"\n",
        )?;
        let cfg = ConfigLoader::with_paths(paths).load()?;
        assert_eq!(cfg.theme, ThemeName::HighContrast);
        assert_eq!(cfg.api.timeout_ms, 10_000);
        assert_eq!(cfg.view.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(ResourceKind::from(cfg.view.default_tab), ResourceKind::Cars);
        Ok(())
    }

    #[test]
    fn env_and_flag_override_base_url() {
        let mut cfg = AppConfig::default();
        cfg.post_load(Some("http://env:1".into()));
        assert_eq!(cfg.api.base_url, "http://env:1");
        cfg.apply_overrides(Some("http://flag:2"));
        assert_eq!(cfg.api.base_url, "http://flag:2");
        cfg.post_load(Some("   ".into()));
        assert_eq!(cfg.api.base_url, "http://flag:2");
    }

    #[test]
    fn rejects_malformed_toml() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let paths = ConfigPaths::rooted(root.path());
        paths.ensure_directories()?;
        fs::write(&paths.config_file, "[api\nbase_url = ")?;
        assert!(ConfigLoader::with_paths(paths).load().is_err());
        Ok(())
    }
}
