use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Cache version used when none is configured.
pub const DEFAULT_CACHE_VERSION: &str = "khatape-business-v1";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Name of the active cache store; bump to invalidate everything cached
  pub cache_version: String,
  /// Origin that relative URLs resolve against and that counts as same-origin
  pub origin: String,
  /// Assets fetched and stored on install, in order
  pub static_assets: Vec<String>,
  pub asset_filter: AssetFilterConfig,
  pub offline: OfflineConfig,
  /// Sync tag that triggers background sync
  pub sync_tag: String,
  pub notifications: NotificationConfig,
  pub storage: StorageConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      cache_version: DEFAULT_CACHE_VERSION.to_string(),
      origin: "http://localhost:5001".to_string(),
      static_assets: [
        "/",
        "/static/css/style.css",
        "/static/css/dark-theme.css",
        "/static/favicon.ico",
        "/static/images/icon-192.png",
        "/static/images/icon-512.png",
        "https://fonts.googleapis.com/css2?family=Nunito:wght@300;400;500;600;700&display=swap",
        "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.2.0/css/all.min.css",
      ]
      .into_iter()
      .map(String::from)
      .collect(),
      asset_filter: AssetFilterConfig::default(),
      offline: OfflineConfig::default(),
      sync_tag: "background-sync".to_string(),
      notifications: NotificationConfig::default(),
      storage: StorageConfig::default(),
    }
  }
}

/// Which successful network responses get cached on the fly.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetFilterConfig {
  /// URLs containing this path fragment are cached
  pub path_prefix: String,
  /// URLs ending in one of these extensions are cached (case-sensitive)
  #[serde(deserialize_with = "deserialize_extensions")]
  pub extensions: Vec<String>,
}

impl Default for AssetFilterConfig {
  fn default() -> Self {
    Self {
      path_prefix: "/static/".to_string(),
      extensions: ["css", "js", "png", "jpg", "jpeg", "gif", "ico", "svg"]
        .into_iter()
        .map(String::from)
        .collect(),
    }
  }
}

/// Accept both "css" and ".css".
fn deserialize_extensions<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(
    v.into_iter()
      .map(|s| s.trim_start_matches('.').to_string())
      .filter(|s| !s.is_empty())
      .collect(),
  )
}

/// Responses used when the network is unreachable.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
  /// Cached document served for failed navigations
  pub navigation_fallback: String,
  pub status: u16,
  pub status_text: String,
  pub body: String,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    Self {
      navigation_fallback: "/".to_string(),
      status: 503,
      status_text: "Service Unavailable".to_string(),
      body: "Offline".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  /// Title used when a push payload has none
  pub default_title: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      default_title: "KhataPe Business".to_string(),
      icon: "/static/images/icon-192.png".to_string(),
      badge: "/static/images/icon-192.png".to_string(),
      vibrate: vec![100, 50, 100],
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
  /// SQLite database path (default: $XDG_DATA_HOME/assetcache/cache.db)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./assetcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/assetcache/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        tracing::debug!("No configuration file found, using defaults");
        Self::default()
      }
    };

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("assetcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("assetcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Check the invariants the worker relies on.
  pub fn validate(&self) -> Result<()> {
    if self.cache_version.trim().is_empty() {
      return Err(eyre!("cache_version must not be empty"));
    }
    let origin = self.origin_url()?;
    for asset in &self.static_assets {
      origin
        .join(asset)
        .map_err(|e| eyre!("Invalid static asset URL '{}': {}", asset, e))?;
    }
    Ok(())
  }

  /// The configured origin as an absolute URL.
  pub fn origin_url(&self) -> Result<Url> {
    let url = Url::parse(&self.origin)
      .map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))?;
    if url.cannot_be_a_base() {
      return Err(eyre!("Origin '{}' is not a base URL", self.origin));
    }
    Ok(url)
  }

  /// Resolve a possibly relative URL against the origin.
  pub fn resolve(&self, url: &str) -> Result<Url> {
    self
      .origin_url()?
      .join(url)
      .map_err(|e| eyre!("Invalid URL '{}': {}", url, e))
  }

  /// Database path, honouring the configured override.
  pub fn database_path(&self) -> Option<&Path> {
    self.storage.path.as_deref()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.cache_version, "khatape-business-v1");
    assert_eq!(config.static_assets.len(), 8);
    assert_eq!(config.offline.status, 503);
    assert_eq!(config.offline.body, "Offline");
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let config = Config::from_yaml(
      "cache_version: app-v2\n\
       origin: https://example.com\n\
       asset_filter:\n  extensions: [\".woff2\", css]\n",
    )
    .unwrap();

    assert_eq!(config.cache_version, "app-v2");
    assert_eq!(config.asset_filter.extensions, vec!["woff2", "css"]);
    assert_eq!(config.asset_filter.path_prefix, "/static/");
    assert_eq!(config.sync_tag, "background-sync");
  }

  #[test]
  fn test_resolve_relative_and_absolute() {
    let config = Config {
      origin: "https://example.com".to_string(),
      ..Config::default()
    };

    assert_eq!(
      config.resolve("/static/favicon.ico").unwrap().as_str(),
      "https://example.com/static/favicon.ico"
    );
    assert_eq!(
      config.resolve("https://cdn.test/a.css").unwrap().as_str(),
      "https://cdn.test/a.css"
    );
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    let empty_version = Config {
      cache_version: " ".to_string(),
      ..Config::default()
    };
    assert!(empty_version.validate().is_err());

    let bad_origin = Config {
      origin: "not a url".to_string(),
      ..Config::default()
    };
    assert!(bad_origin.validate().is_err());
  }

  #[test]
  fn test_example_config_matches_defaults() {
    let example = Config::from_yaml(include_str!("../config.example.yaml")).unwrap();
    let defaults = Config::default();

    assert_eq!(example.cache_version, defaults.cache_version);
    assert_eq!(example.static_assets, defaults.static_assets);
    assert_eq!(example.asset_filter.extensions, defaults.asset_filter.extensions);
    assert_eq!(example.notifications.vibrate, defaults.notifications.vibrate);
    assert!(example.storage.path.is_none());
  }

  #[test]
  fn test_missing_explicit_path_is_error() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
