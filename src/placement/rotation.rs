use super::{HostLease, HostSelector};

use parking_lot::Mutex;

struct RotationState {
    hosts: Vec<String>,
    next: usize,
}

impl RotationState {
    fn advance(&mut self) -> Option<String> {
        if self.hosts.is_empty() {
            return None;
        }
        let host = self.hosts[self.next].clone();
        self.next = (self.next + 1) % self.hosts.len();
        Some(host)
    }
}

/// Round-robin selector.
pub struct RotationSelector {
    state: Mutex<RotationState>,
}

impl RotationSelector {
    pub fn new(hosts: &[String]) -> Self {
        Self {
            state: Mutex::new(RotationState {
                hosts: hosts.to_vec(),
                next: 0,
            }),
        }
    }

    /// Index the next `select` will read.
    pub fn position(&self) -> usize {
        self.state.lock().next
    }
}

impl HostSelector for RotationSelector {
    fn select(&self) -> Option<HostLease> {
        self.state.lock().advance().map(HostLease::untracked)
    }

    fn select_excluding(&self, exclude: &[&str]) -> Option<HostLease> {
        let mut state = self.state.lock();
        let first = state.advance()?;
        if !exclude.contains(&first.as_str()) {
            return Some(HostLease::untracked(first));
        }

        // At most one lap around the pool.
        for _ in 1..state.hosts.len() {
            if let Some(host) = state.advance() {
                if !exclude.contains(&host.as_str()) {
                    return Some(HostLease::untracked(host));
                }
            }
        }

        Some(HostLease::untracked(first))
    }

    fn lease_for(&self, host: &str) -> HostLease {
        HostLease::untracked(host)
    }

    fn replace_pool(&self, hosts: &[String]) {
        let mut state = self.state.lock();
        if state.hosts == hosts {
            return;
        }
        state.hosts = hosts.to_vec();
        if state.hosts.is_empty() {
            state.next = 0;
        } else {
            state.next %= state.hosts.len();
        }
        tracing::info!(
            "Rotation pool replaced with {} host(s), next index {}",
            state.hosts.len(),
            state.next
        );
    }

    fn hosts(&self) -> Vec<String> {
        self.state.lock().hosts.clone()
    }
}
