//! Host adapter: drives the worker lifecycle and routes events to its handler.

use color_eyre::{eyre::eyre, Result};
use tracing::{debug, warn};

use crate::cache::Served;
use crate::fetch::Request;
use crate::network::Network;
use crate::worker::{
  ActivateEvent, FetchEvent, FetchOutcome, InstallEvent, LifecycleHandler, PushEvent, SyncEvent,
};

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerState {
  /// Registered, no event delivered yet
  #[default]
  Parsed,
  Installing,
  /// Installed, waiting to activate
  Installed,
  Activating,
  /// Active; receives fetch, sync and push events
  Activated,
  /// Failed or superseded by a newer worker
  Redundant,
}

fn is_valid_transition(from: WorkerState, to: WorkerState) -> bool {
  use WorkerState::*;

  matches!(
    (from, to),
    (Parsed, Installing)
      | (Installing, Installed)
      | (Installing, Redundant)
      | (Installed, Activating)
      | (Installed, Redundant)
      | (Activating, Activated)
      | (Activating, Redundant)
      | (Activated, Redundant)
  )
}

/// Delivers lifecycle events to a handler and applies default handling
/// whenever the handler declines a fetch.
pub struct Host<H: LifecycleHandler, N: Network> {
  handler: H,
  /// Used for requests the handler passes through
  network: N,
  state: WorkerState,
  /// Whether the worker controls open clients
  controlling: bool,
}

impl<H: LifecycleHandler, N: Network> Host<H, N> {
  /// Host for a freshly registered worker.
  pub fn new(handler: H, network: N) -> Self {
    Self {
      handler,
      network,
      state: WorkerState::Parsed,
      controlling: false,
    }
  }

  /// Host for a worker installed in an earlier session, waiting to activate.
  pub fn restore_installed(handler: H, network: N) -> Self {
    Self {
      state: WorkerState::Installed,
      ..Self::new(handler, network)
    }
  }

  /// Host for a worker that was already active and controlling clients.
  pub fn restore_active(handler: H, network: N) -> Self {
    Self {
      state: WorkerState::Activated,
      controlling: true,
      ..Self::new(handler, network)
    }
  }

  pub fn state(&self) -> WorkerState {
    self.state
  }

  pub fn is_controlling(&self) -> bool {
    self.controlling
  }

  pub fn handler(&self) -> &H {
    &self.handler
  }

  fn transition(&mut self, to: WorkerState) -> Result<()> {
    if !is_valid_transition(self.state, to) {
      return Err(eyre!(
        "Invalid worker state transition {:?} -> {:?}",
        self.state,
        to
      ));
    }
    debug!(from = ?self.state, to = ?to, "Worker state change");
    self.state = to;
    Ok(())
  }

  /// Deliver the install event; activates straight away if the handler
  /// asked to skip waiting.
  pub async fn install(&mut self) -> Result<()> {
    self.transition(WorkerState::Installing)?;

    let mut event = InstallEvent::new();
    if let Err(e) = self.handler.on_install(&mut event).await {
      self.transition(WorkerState::Redundant)?;
      return Err(e.wrap_err("Install failed"));
    }
    self.transition(WorkerState::Installed)?;

    if event.skip_waiting_requested() {
      self.activate().await?;
    }
    Ok(())
  }

  /// Deliver the activate event. A failing handler is logged; the worker
  /// still becomes active.
  pub async fn activate(&mut self) -> Result<()> {
    self.transition(WorkerState::Activating)?;

    let mut event = ActivateEvent::new();
    if let Err(e) = self.handler.on_activate(&mut event).await {
      warn!("Activate handler failed: {}", e);
    }
    self.transition(WorkerState::Activated)?;

    if event.claim_requested() {
      self.controlling = true;
    }
    Ok(())
  }

  /// Answer a request, through the handler when the worker is in control.
  ///
  /// Errors only come from default handling, i.e. when the worker is not in
  /// control or passes the request through and the network rejects it.
  pub async fn fetch(&self, request: Request) -> Result<Served> {
    if self.state == WorkerState::Activated && self.controlling {
      let event = FetchEvent { request };
      match self.handler.on_fetch(&event).await {
        FetchOutcome::Respond(served) => return Ok(served),
        FetchOutcome::Passthrough => {
          debug!(method = %event.request.method, url = %event.request.url, "Passing through");
          return self.default_fetch(&event.request).await;
        }
      }
    }

    self.default_fetch(&request).await
  }

  async fn default_fetch(&self, request: &Request) -> Result<Served> {
    self.network.fetch(request).await.map(Served::from_network)
  }

  pub async fn sync(&self, tag: &str) -> Result<()> {
    self.ensure_active()?;
    self
      .handler
      .on_sync(&SyncEvent {
        tag: tag.to_string(),
      })
      .await
  }

  pub async fn push(&self, data: Option<Vec<u8>>) -> Result<()> {
    self.ensure_active()?;
    self.handler.on_push(&PushEvent { data }).await
  }

  /// Retire this worker in favour of a newer one.
  pub fn supersede(&mut self) -> Result<()> {
    self.transition(WorkerState::Redundant)?;
    self.controlling = false;
    Ok(())
  }

  fn ensure_active(&self) -> Result<()> {
    if self.state != WorkerState::Activated {
      return Err(eyre!("Worker is not active (state: {:?})", self.state));
    }
    Ok(())
  }
}
