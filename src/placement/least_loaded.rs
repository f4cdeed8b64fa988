use super::{HostLease, HostSelector};

use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct HostLoad {
    host: String,
    in_flight: usize,
}

/// Selects the host with the fewest in-flight postings.
///
/// Counts are incremented on selection and decremented when the returned
/// `HostLease` is dropped.
pub struct LeastLoadedSelector {
    loads: Arc<Mutex<Vec<HostLoad>>>,
}

impl LeastLoadedSelector {
    pub fn new(hosts: &[String]) -> Self {
        Self {
            loads: Arc::new(Mutex::new(
                hosts
                    .iter()
                    .map(|host| HostLoad {
                        host: host.clone(),
                        in_flight: 0,
                    })
                    .collect(),
            )),
        }
    }

    /// Current in-flight count for `host`, if it is in the pool.
    pub fn in_flight(&self, host: &str) -> Option<usize> {
        self.loads
            .lock()
            .iter()
            .find(|load| load.host == host)
            .map(|load| load.in_flight)
    }

    fn acquire(&self, exclude: &[&str]) -> Option<HostLease> {
        let mut loads = self.loads.lock();

        let pick = |skip: &[&str]| {
            loads
                .iter()
                .enumerate()
                .filter(|(_, load)| !skip.contains(&load.host.as_str()))
                // min_by_key keeps the first minimum, i.e. pool order on ties.
                .min_by_key(|(_, load)| load.in_flight)
                .map(|(idx, _)| idx)
        };

        let idx = pick(exclude).or_else(|| pick(&[]))?;
        loads[idx].in_flight += 1;
        let host = loads[idx].host.clone();

        Some(self.tracked(host))
    }

    fn tracked(&self, host: String) -> HostLease {
        let shared = Arc::clone(&self.loads);
        HostLease::tracked(
            host,
            Box::new(move |host: &str| {
                let mut loads = shared.lock();
                if let Some(load) = loads.iter_mut().find(|load| load.host == host) {
                    load.in_flight = load.in_flight.saturating_sub(1);
                }
            }),
        )
    }
}

impl HostSelector for LeastLoadedSelector {
    fn select(&self) -> Option<HostLease> {
        self.acquire(&[])
    }

    fn select_excluding(&self, exclude: &[&str]) -> Option<HostLease> {
        self.acquire(exclude)
    }

    fn lease_for(&self, host: &str) -> HostLease {
        let known = {
            let mut loads = self.loads.lock();
            match loads.iter_mut().find(|load| load.host == host) {
                Some(load) => {
                    load.in_flight += 1;
                    true
                }
                None => false,
            }
        };

        if known {
            self.tracked(host.to_string())
        } else {
            // Host left the pool since the task was placed.
            HostLease::untracked(host)
        }
    }

    fn replace_pool(&self, hosts: &[String]) {
        let mut loads = self.loads.lock();
        let next: Vec<HostLoad> = hosts
            .iter()
            .map(|host| HostLoad {
                host: host.clone(),
                in_flight: loads
                    .iter()
                    .find(|load| &load.host == host)
                    .map(|load| load.in_flight)
                    .unwrap_or(0),
            })
            .collect();
        *loads = next;
        tracing::info!("Least-loaded pool replaced with {} host(s)", loads.len());
    }

    fn hosts(&self) -> Vec<String> {
        self.loads.lock().iter().map(|load| load.host.clone()).collect()
    }
}
