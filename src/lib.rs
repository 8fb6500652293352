//! Versioned, cache-first asset manager.
//!
//! A [`worker::CacheFallbackManager`] owns one named cache store. It fills the
//! store with a static asset list on install, purges stores of other versions
//! on activate, and answers GET requests from the cache before falling back to
//! the network. When the network is unreachable it serves the cached root
//! document for navigations and a synthetic 503 for everything else.
//!
//! The [`host::Host`] adapter delivers lifecycle events to the manager and
//! applies default network handling to requests it passes through.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod host;
pub mod network;
pub mod notify;
pub mod worker;
