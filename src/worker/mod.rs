//! The cache-first worker and the events it handles.

mod events;
mod filter;
mod manager;

pub use events::{
  ActivateEvent, FetchEvent, FetchOutcome, InstallEvent, LifecycleHandler, PushEvent, SyncEvent,
};
pub use filter::AssetFilter;
pub use manager::CacheFallbackManager;

/// In-memory fakes for exercising the worker and host without a network.
#[cfg(test)]
pub(crate) mod testing {
  use async_trait::async_trait;
  use color_eyre::{eyre::eyre, Result};
  use std::collections::{HashMap, HashSet};
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Mutex;

  use crate::fetch::{Request, Response, ResponseType};
  use crate::network::Network;
  use crate::notify::{Notification, Notifier};

  /// Network that answers from a fixed route table and records every call.
  #[derive(Default)]
  pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    failing: Mutex<HashSet<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
  }

  impl ScriptedNetwork {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn route(&self, url: &str, response: Response) {
      self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    /// Same-origin 200 with the given body.
    pub fn route_ok(&self, url: &str, body: &str) {
      self.route(
        url,
        Response::new(200, body)
          .with_status_text("OK")
          .with_type(ResponseType::Basic),
      );
    }

    /// Reject fetches of one URL.
    pub fn fail(&self, url: &str) {
      self.failing.lock().unwrap().insert(url.to_string());
    }

    /// Reject every fetch.
    pub fn set_offline(&self, offline: bool) {
      self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
      self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
      self.calls.lock().unwrap().len()
    }
  }

  #[async_trait]
  impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response> {
      let url = request.url.to_string();
      self.calls.lock().unwrap().push(url.clone());

      if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&url) {
        return Err(eyre!("Failed to fetch {}: network unreachable", url));
      }

      Ok(
        self
          .routes
          .lock()
          .unwrap()
          .get(&url)
          .cloned()
          .unwrap_or_else(|| {
            Response::new(404, "Not Found")
              .with_status_text("Not Found")
              .with_type(ResponseType::Basic)
          }),
      )
    }
  }

  /// Notifier that keeps every notification it was asked to show.
  #[derive(Default)]
  pub struct RecordingNotifier {
    shown: Mutex<Vec<Notification>>,
  }

  impl RecordingNotifier {
    pub fn shown(&self) -> Vec<Notification> {
      self.shown.lock().unwrap().clone()
    }
  }

  impl Notifier for RecordingNotifier {
    fn show(&self, notification: &Notification) -> Result<()> {
      self.shown.lock().unwrap().push(notification.clone());
      Ok(())
    }
  }
}
