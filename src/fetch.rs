//! Request and response value types shared by the cache, network and worker layers.

use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

/// How the request was initiated by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
  /// Top-level document load
  Navigate,
  SameOrigin,
  #[default]
  NoCors,
  Cors,
}

/// Classification of a response relative to the requesting origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
  /// Same-origin response with full access to status and body
  Basic,
  /// Cross-origin response obtained through CORS
  Cors,
  /// Cross-origin response without CORS access
  Opaque,
  /// Network error placeholder
  Error,
  /// Synthesized locally
  #[default]
  Default,
}

impl ResponseType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Basic => "basic",
      Self::Cors => "cors",
      Self::Opaque => "opaque",
      Self::Error => "error",
      Self::Default => "default",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "basic" => Ok(Self::Basic),
      "cors" => Ok(Self::Cors),
      "opaque" => Ok(Self::Opaque),
      "error" => Ok(Self::Error),
      "default" => Ok(Self::Default),
      other => Err(eyre!("Unknown response type '{}'", other)),
    }
  }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub mode: RequestMode,
}

impl Request {
  /// Plain GET sub-resource request.
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::default(),
    }
  }

  /// GET request loading a top-level document.
  pub fn navigate(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::Navigate,
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }

  /// Cache key for this request.
  pub fn key(&self) -> RequestKey {
    RequestKey::new(&self.method, &self.url)
  }
}

/// Cache key: method plus absolute URL without its fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
  pub method: String,
  pub url: String,
}

impl RequestKey {
  pub fn new(method: &Method, url: &Url) -> Self {
    let mut url = url.clone();
    url.set_fragment(None);
    Self {
      method: method.as_str().to_string(),
      url: url.to_string(),
    }
  }

  pub fn get(url: &Url) -> Self {
    Self::new(&Method::GET, url)
  }
}

impl std::fmt::Display for RequestKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} {}", self.method, self.url)
  }
}

/// A fully-read response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub response_type: ResponseType,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      status_text: String::new(),
      headers: Vec::new(),
      body: body.into(),
      response_type: ResponseType::Default,
    }
  }

  pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
    self.status_text = status_text.into();
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_type(mut self, response_type: ResponseType) -> Self {
    self.response_type = response_type;
    self
  }

  /// Whether the status is in the 2xx range.
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }

  /// Consume the response, producing two independent copies.
  ///
  /// The first is handed back to the caller, the second can be persisted.
  pub fn tee(self) -> (Response, Response) {
    let copy = Response {
      status: self.status,
      status_text: self.status_text.clone(),
      headers: self.headers.clone(),
      body: self.body.clone(),
      response_type: self.response_type,
    };
    (self, copy)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_request_key_includes_method() {
    let url = Url::parse("http://localhost/static/app.js").unwrap();
    let get = Request::get(url.clone()).key();
    let post = Request::get(url).with_method(Method::POST).key();

    assert_eq!(get.method, "GET");
    assert_ne!(get, post);
    assert_eq!(get.to_string(), "GET http://localhost/static/app.js");
  }

  #[test]
  fn test_request_key_ignores_fragment() {
    let plain = Url::parse("http://localhost/static/sprite.svg").unwrap();
    let anchored = Url::parse("http://localhost/static/sprite.svg#icon-cash").unwrap();

    assert_eq!(RequestKey::get(&anchored), RequestKey::get(&plain));
    assert_eq!(RequestKey::get(&anchored).url, "http://localhost/static/sprite.svg");
  }

  #[test]
  fn test_tee_produces_equal_copies() {
    let response = Response::new(200, "body")
      .with_header("Content-Type", "text/css")
      .with_type(ResponseType::Basic);

    let (a, b) = response.tee();
    assert_eq!(a, b);
    assert_eq!(b.header("content-type"), Some("text/css"));
  }

  #[test]
  fn test_response_type_parse() {
    assert_eq!(ResponseType::parse("basic").unwrap(), ResponseType::Basic);
    assert_eq!(
      ResponseType::parse(ResponseType::Opaque.as_str()).unwrap(),
      ResponseType::Opaque
    );
    assert!(ResponseType::parse("bogus").is_err());
  }
}
