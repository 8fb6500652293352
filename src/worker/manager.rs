//! Cache-first request handling with network fallback and offline responses.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::events::{
  ActivateEvent, FetchEvent, FetchOutcome, InstallEvent, LifecycleHandler, PushEvent, SyncEvent,
};
use super::filter::AssetFilter;
use crate::cache::{CacheStorage, Served};
use crate::config::{Config, NotificationConfig, OfflineConfig};
use crate::fetch::{Request, RequestKey, Response, ResponseType};
use crate::network::Network;
use crate::notify::{Notification, Notifier, PushPayload};

/// Owns one versioned cache and answers intercepted GETs cache-first.
///
/// Install pre-populates the store with the static asset list, activate purges
/// every store with a different version, and fetch serves cache hits without
/// touching the network. Misses go to the network; successful same-origin
/// asset responses are stored on the way back.
pub struct CacheFallbackManager<S: CacheStorage, N: Network> {
  storage: Arc<S>,
  network: N,
  notifier: Arc<dyn Notifier>,
  version: String,
  static_assets: Vec<Url>,
  filter: AssetFilter,
  navigation_fallback: Url,
  offline: OfflineConfig,
  sync_tag: String,
  notifications: NotificationConfig,
}

impl<S: CacheStorage, N: Network> CacheFallbackManager<S, N> {
  pub fn new(
    config: &Config,
    storage: Arc<S>,
    network: N,
    notifier: Arc<dyn Notifier>,
  ) -> Result<Self> {
    let static_assets = config
      .static_assets
      .iter()
      .map(|asset| config.resolve(asset))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      storage,
      network,
      notifier,
      version: config.cache_version.clone(),
      static_assets,
      filter: AssetFilter::new(&config.asset_filter),
      navigation_fallback: config.resolve(&config.offline.navigation_fallback)?,
      offline: config.offline.clone(),
      sync_tag: config.sync_tag.clone(),
      notifications: config.notifications.clone(),
    })
  }

  /// Name of the store this manager writes to.
  pub fn version(&self) -> &str {
    &self.version
  }

  /// Fetch every static asset, then store them all in one batch.
  ///
  /// Any rejected fetch or non-2xx status abandons the whole batch.
  async fn precache(&self) -> Result<usize> {
    self.storage.open(&self.version)?;

    let fetches = self.static_assets.iter().map(|url| async move {
      let request = Request::get(url.clone());
      let response = self.network.fetch(&request).await?;
      if !response.ok() {
        return Err(eyre!(
          "Request for {} failed with status {}",
          url,
          response.status
        ));
      }
      Ok::<_, color_eyre::Report>((request.key(), response))
    });

    let entries = try_join_all(fetches).await?;
    self.storage.put_all(&self.version, &entries)?;

    Ok(entries.len())
  }

  /// Hand the response back, storing a copy if it is a cacheable asset.
  fn respond_from_network(&self, request: &Request, response: Response) -> Served {
    if response.status != 200 || response.response_type != ResponseType::Basic {
      return Served::from_network(response);
    }

    if !self.filter.matches(&request.url) {
      return Served::from_network(response);
    }

    let (response, copy) = response.tee();
    match self.storage.put(&self.version, &request.key(), &copy) {
      Ok(()) => debug!(url = %request.url, "Cached network response"),
      Err(e) => warn!(url = %request.url, "Failed to cache response: {}", e),
    }

    Served::from_network(response)
  }

  /// Response for a request whose network fetch was rejected.
  fn respond_offline(&self, request: &Request) -> Served {
    if request.is_navigation() {
      match self.storage.match_any(&RequestKey::get(&self.navigation_fallback)) {
        Ok(Some(cached)) => return Served::offline(cached),
        Ok(None) => debug!("No cached fallback document for {}", request.url),
        Err(e) => warn!("Failed to read fallback document: {}", e),
      }
    }

    Served::unavailable(
      Response::new(self.offline.status, self.offline.body.clone())
        .with_status_text(self.offline.status_text.clone())
        .with_header("content-type", "text/plain; charset=utf-8"),
    )
  }
}

#[async_trait]
impl<S: CacheStorage, N: Network> LifecycleHandler for CacheFallbackManager<S, N> {
  async fn on_install(&self, event: &mut InstallEvent) -> Result<()> {
    info!(version = %self.version, "Installing");

    match self.precache().await {
      Ok(count) => info!("Cached {} static assets", count),
      Err(e) => warn!("Static asset caching failed: {}", e),
    }

    event.skip_waiting();
    Ok(())
  }

  async fn on_activate(&self, event: &mut ActivateEvent) -> Result<()> {
    info!(version = %self.version, "Activating");
    event.claim_clients();

    let mut failed = Vec::new();
    for name in self.storage.names()? {
      if name == self.version {
        continue;
      }
      info!("Deleting old cache {}", name);
      if let Err(e) = self.storage.delete(&name) {
        warn!("Failed to delete cache {}: {}", name, e);
        failed.push(name);
      }
    }

    if !failed.is_empty() {
      return Err(eyre!("Failed to delete old caches: {}", failed.join(", ")));
    }
    Ok(())
  }

  async fn on_fetch(&self, event: &FetchEvent) -> FetchOutcome {
    let request = &event.request;

    if request.method != Method::GET {
      return FetchOutcome::Passthrough;
    }

    match self.storage.match_any(&request.key()) {
      Ok(Some(cached)) => {
        debug!(url = %request.url, "Serving from cache");
        return FetchOutcome::Respond(Served::from_cache(cached));
      }
      Ok(None) => {}
      Err(e) => warn!(url = %request.url, "Cache lookup failed: {}", e),
    }

    debug!(url = %request.url, "Fetching from network");
    let served = match self.network.fetch(request).await {
      Ok(response) => self.respond_from_network(request, response),
      Err(e) => {
        info!("Fetch failed: {}", e);
        self.respond_offline(request)
      }
    };

    FetchOutcome::Respond(served)
  }

  async fn on_sync(&self, event: &SyncEvent) -> Result<()> {
    if event.tag == self.sync_tag {
      info!(tag = %event.tag, "Background sync triggered");
    } else {
      debug!(tag = %event.tag, "Ignoring sync event");
    }
    Ok(())
  }

  async fn on_push(&self, event: &PushEvent) -> Result<()> {
    let Some(data) = &event.data else {
      return Ok(());
    };

    let Some(payload) = PushPayload::parse(data) else {
      debug!("Ignoring push with malformed payload");
      return Ok(());
    };

    debug!(?payload, "Push received");
    let notification = Notification::from_payload(payload, &self.notifications);
    self.notifier.show(&notification)
  }
}
