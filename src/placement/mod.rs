//! Host Selection
//!
//! Chooses which storage host receives a plot, both for the first placement
//! and when a host reports a failed transfer.
//!
//! ## Policies
//! - **`rotation`**: round robin over the pool. The index is shared by every
//!   caller and wraps modulo the current pool size.
//! - **`least_loaded`**: picks the host with the fewest upload notifications
//!   in flight, ties broken by pool order.
//!
//! Both policies hand out a `HostLease`. For the least-loaded policy the lease
//! holds the in-flight slot and gives it back when dropped; for rotation it is
//! a plain host name.
//!
//! Pools are replaced wholesale on config reload via `replace_pool`.

pub mod least_loaded;
pub mod rotation;

#[cfg(test)]
mod tests;

use crate::config::types::LOOPBACK_HOST;
use crate::config::{RelayConfig, SelectorPolicy};
use std::fmt;
use std::sync::Arc;

pub use least_loaded::LeastLoadedSelector;
pub use rotation::RotationSelector;

pub trait HostSelector: Send + Sync {
    /// Next host according to the policy, or `None` for an empty pool.
    fn select(&self) -> Option<HostLease>;

    /// Like `select`, but avoids every host in `exclude` whenever the pool
    /// has one outside it.
    fn select_excluding(&self, exclude: &[&str]) -> Option<HostLease>;

    /// Lease on a host chosen earlier, held around a posting to it.
    fn lease_for(&self, host: &str) -> HostLease;

    /// Swaps in a new pool, keeping internal state within its bounds.
    fn replace_pool(&self, hosts: &[String]);

    fn hosts(&self) -> Vec<String>;
}

pub fn build_selector(policy: SelectorPolicy, hosts: &[String]) -> Arc<dyn HostSelector> {
    match policy {
        SelectorPolicy::Rotation => Arc::new(RotationSelector::new(hosts)),
        SelectorPolicy::LeastLoaded => Arc::new(LeastLoadedSelector::new(hosts)),
    }
}

/// Placement honouring local mode, where every plot goes to the loopback host.
pub fn assign_host(
    selector: &dyn HostSelector,
    config: &RelayConfig,
    exclude: &[&str],
) -> Option<HostLease> {
    if config.local_mode {
        return Some(HostLease::untracked(LOOPBACK_HOST));
    }
    if exclude.is_empty() {
        selector.select()
    } else {
        selector.select_excluding(exclude)
    }
}

type ReleaseFn = Box<dyn FnOnce(&str) + Send + Sync>;

/// A selected host. Dropping it ends the posting attempt it was taken for.
pub struct HostLease {
    host: String,
    on_release: Option<ReleaseFn>,
}

impl HostLease {
    /// A lease that tracks nothing.
    pub fn untracked(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            on_release: None,
        }
    }

    pub(crate) fn tracked(host: impl Into<String>, on_release: ReleaseFn) -> Self {
        Self {
            host: host.into(),
            on_release: Some(on_release),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Debug for HostLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostLease")
            .field("host", &self.host)
            .field("tracked", &self.on_release.is_some())
            .finish()
    }
}

impl Drop for HostLease {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release(&self.host);
        }
    }
}
