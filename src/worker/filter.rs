use url::Url;

use crate::config::AssetFilterConfig;

/// Decides which successful network responses are cached on the fly.
///
/// Matching runs against the full URL string, query included, so
/// `/app.js?v=2` only matches through the path prefix.
#[derive(Debug, Clone)]
pub struct AssetFilter {
  path_prefix: String,
  suffixes: Vec<String>,
}

impl AssetFilter {
  pub fn new(config: &AssetFilterConfig) -> Self {
    Self {
      path_prefix: config.path_prefix.clone(),
      suffixes: config
        .extensions
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect(),
    }
  }

  pub fn matches(&self, url: &Url) -> bool {
    let url = url.as_str();
    (!self.path_prefix.is_empty() && url.contains(&self.path_prefix))
      || self.suffixes.iter().any(|suffix| url.ends_with(suffix))
  }
}

impl Default for AssetFilter {
  fn default() -> Self {
    Self::new(&AssetFilterConfig::default())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn matches(url: &str) -> bool {
    AssetFilter::default().matches(&Url::parse(url).unwrap())
  }

  #[test]
  fn test_static_prefix_matches() {
    assert!(matches("http://localhost:5001/static/fonts/nunito.woff2"));
    assert!(matches("http://localhost:5001/static/app.js?v=2"));
  }

  #[test]
  fn test_extension_matches() {
    assert!(matches("http://localhost:5001/bundle.js"));
    assert!(matches("http://localhost:5001/img/logo.svg"));
    assert!(matches("https://cdn.test/lib/all.min.css"));
  }

  #[test]
  fn test_extension_is_case_sensitive() {
    assert!(!matches("http://localhost:5001/img/LOGO.PNG"));
  }

  #[test]
  fn test_pages_and_api_do_not_match() {
    assert!(!matches("http://localhost:5001/"));
    assert!(!matches("http://localhost:5001/dashboard"));
    assert!(!matches("http://localhost:5001/api/customers.json"));
    assert!(!matches("http://localhost:5001/app.js?v=2"));
  }
}
