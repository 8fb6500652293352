//! Core types for the caching system.

use chrono::{DateTime, Utc};

use crate::fetch::Response;

/// A response held in a cache store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  /// The stored response
  pub response: Response,
  /// When the response was stored
  pub cached_at: DateTime<Utc>,
}

/// Result of answering a request, including metadata about the source.
#[derive(Debug, Clone)]
pub struct Served {
  /// The response handed back to the client
  pub response: Response,
  /// Where the response came from
  pub source: ResponseSource,
  /// When the response was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl Served {
  /// Fresh response from the network.
  pub fn from_network(response: Response) -> Self {
    Self {
      response,
      source: ResponseSource::Network,
      cached_at: None,
    }
  }

  /// Response found in a cache store.
  pub fn from_cache(cached: CachedResponse) -> Self {
    Self {
      response: cached.response,
      source: ResponseSource::Cache,
      cached_at: Some(cached.cached_at),
    }
  }

  /// Cached root document served because the network is unavailable.
  pub fn offline(cached: CachedResponse) -> Self {
    Self {
      response: cached.response,
      source: ResponseSource::OfflineFallback,
      cached_at: Some(cached.cached_at),
    }
  }

  /// Synthetic response produced when nothing else is available.
  pub fn unavailable(response: Response) -> Self {
    Self {
      response,
      source: ResponseSource::Unavailable,
      cached_at: None,
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Served from a cache store, no network call made
  Cache,
  /// Fetched from the network
  Network,
  /// Network unavailable, serving the cached root document
  OfflineFallback,
  /// Network unavailable, synthetic 503
  Unavailable,
}

impl std::fmt::Display for ResponseSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      Self::Cache => "cache",
      Self::Network => "network",
      Self::OfflineFallback => "offline-fallback",
      Self::Unavailable => "unavailable",
    };
    f.write_str(s)
  }
}
