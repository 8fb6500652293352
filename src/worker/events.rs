//! Lifecycle events delivered by the host and the handler interface that receives them.

use async_trait::async_trait;
use color_eyre::Result;

use crate::cache::Served;
use crate::fetch::Request;

/// Install event. The handler may ask to skip the waiting phase.
#[derive(Debug, Default)]
pub struct InstallEvent {
  skip_waiting: bool,
}

impl InstallEvent {
  pub fn new() -> Self {
    Self::default()
  }

  /// Activate as soon as install completes.
  pub fn skip_waiting(&mut self) {
    self.skip_waiting = true;
  }

  pub fn skip_waiting_requested(&self) -> bool {
    self.skip_waiting
  }
}

/// Activate event. The handler may ask to take control of open clients.
#[derive(Debug, Default)]
pub struct ActivateEvent {
  claim: bool,
}

impl ActivateEvent {
  pub fn new() -> Self {
    Self::default()
  }

  /// Control already-open clients without waiting for a reload.
  pub fn claim_clients(&mut self) {
    self.claim = true;
  }

  pub fn claim_requested(&self) -> bool {
    self.claim
  }
}

#[derive(Debug, Clone)]
pub struct FetchEvent {
  pub request: Request,
}

/// How the handler answered a fetch event.
#[derive(Debug)]
pub enum FetchOutcome {
  /// The handler supplied the response
  Respond(Served),
  /// The handler declined; the host applies its default handling
  Passthrough,
}

#[derive(Debug, Clone)]
pub struct SyncEvent {
  pub tag: String,
}

#[derive(Debug, Clone, Default)]
pub struct PushEvent {
  /// Raw payload, if the push carried one
  pub data: Option<Vec<u8>>,
}

/// Handlers for every event the host can deliver.
///
/// The host awaits each returned future before it considers the event done.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
  async fn on_install(&self, event: &mut InstallEvent) -> Result<()>;

  async fn on_activate(&self, event: &mut ActivateEvent) -> Result<()>;

  /// Always produces an outcome; fetch events are never left unanswered.
  async fn on_fetch(&self, event: &FetchEvent) -> FetchOutcome;

  async fn on_sync(&self, event: &SyncEvent) -> Result<()>;

  async fn on_push(&self, event: &PushEvent) -> Result<()>;
}
