use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use url::{Origin, Url};

use crate::fetch::{Request, Response, ResponseType};

/// Network access used when a request misses the cache.
///
/// An `Err` means the fetch was rejected (offline, DNS failure, connection
/// reset). Any HTTP status, including 4xx and 5xx, is a successful fetch.
#[async_trait]
pub trait Network: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response>;
}

#[async_trait]
impl<T: Network + ?Sized> Network for Arc<T> {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    (**self).fetch(request).await
  }
}

/// Network client backed by reqwest.
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
  origin: Origin,
}

impl HttpNetwork {
  /// Create a client; responses from `origin` are classified as same-origin.
  pub fn new(origin: &Url) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("assetcache/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      origin: origin.origin(),
    })
  }

  fn classify(&self, final_url: &Url) -> ResponseType {
    if final_url.origin() == self.origin {
      ResponseType::Basic
    } else {
      ResponseType::Cors
    }
  }
}

#[async_trait]
impl Network for HttpNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let response = self
      .client
      .request(request.method.clone(), request.url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;

    let status = response.status();
    let response_type = self.classify(response.url());
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", request.url, e))?;

    Ok(Response {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or_default().to_string(),
      headers,
      body: body.to_vec(),
      response_type,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn test_same_origin_response_is_basic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/static/css/style.css"))
      .respond_with(
        ResponseTemplate::new(200).set_body_raw("body {}", "text/css"),
      )
      .mount(&server)
      .await;

    let origin = Url::parse(&server.uri()).unwrap();
    let network = HttpNetwork::new(&origin).unwrap();
    let request = Request::get(origin.join("/static/css/style.css").unwrap());

    let response = network.fetch(&request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.status_text, "OK");
    assert_eq!(response.response_type, ResponseType::Basic);
    assert_eq!(response.header("content-type"), Some("text/css"));
    assert_eq!(response.text(), "body {}");
  }

  #[tokio::test]
  async fn test_cross_origin_response_is_cors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/font.css"))
      .respond_with(ResponseTemplate::new(200).set_body_string("@font-face {}"))
      .mount(&server)
      .await;

    let network = HttpNetwork::new(&Url::parse("http://app.invalid").unwrap()).unwrap();
    let request = Request::get(Url::parse(&format!("{}/font.css", server.uri())).unwrap());

    let response = network.fetch(&request).await.unwrap();
    assert_eq!(response.response_type, ResponseType::Cors);
  }

  #[tokio::test]
  async fn test_error_status_is_not_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/missing.js"))
      .respond_with(ResponseTemplate::new(404))
      .mount(&server)
      .await;

    let origin = Url::parse(&server.uri()).unwrap();
    let network = HttpNetwork::new(&origin).unwrap();
    let response = network
      .fetch(&Request::get(origin.join("/missing.js").unwrap()))
      .await
      .unwrap();

    assert_eq!(response.status, 404);
    assert!(!response.ok());
  }

  #[tokio::test]
  async fn test_unreachable_host_rejects() {
    // Grab a free port, then release it so nothing is listening
    let port = {
      let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
      listener.local_addr().unwrap().port()
    };
    let origin = Url::parse(&format!("http://127.0.0.1:{}", port)).unwrap();
    let network = HttpNetwork::new(&origin).unwrap();

    let result = network.fetch(&Request::get(origin.join("/").unwrap())).await;
    assert!(result.is_err());
  }
}
