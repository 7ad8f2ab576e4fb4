//! DAG cache.
//!
//! Light caches and full datasets keyed by epoch. One mutex guards both
//! maps; construction happens inside the critical section, so callers
//! that cannot afford to block poll [`DagCache::get_full`] while the
//! pre-generator fills the cache in the background. Handles are shared,
//! which keeps eviction safe while a worker still computes on an epoch.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::ethash::{epoch_of, EthashFull, EthashLight};

/// Progress notifications for full-DAG generation: `(epoch, percent)`.
pub type DagProgressFn = Box<dyn Fn(u64, u32) + Send + Sync>;

#[derive(Default)]
struct DagMaps {
    light: HashMap<u64, Arc<EthashLight>>,
    full: HashMap<u64, Arc<EthashFull>>,
}

/// Cache of Ethash light caches and full datasets.
pub struct DagCache {
    inner: Mutex<DagMaps>,
    progress: Option<DagProgressFn>,
}

impl DagCache {
    pub fn new(progress: Option<DagProgressFn>) -> Self {
        Self {
            inner: Mutex::new(DagMaps::default()),
            progress,
        }
    }

    /// The light cache for `height`'s epoch, building it if absent.
    pub fn ensure_light(&self, height: u32) -> Arc<EthashLight> {
        let epoch = epoch_of(height);
        let mut maps = self.inner.lock();
        Arc::clone(
            maps.light
                .entry(epoch)
                .or_insert_with(|| Arc::new(EthashLight::new(height))),
        )
    }

    /// The full dataset for `height`'s epoch, building light cache and
    /// dataset as needed. Blocks for minutes on a cold epoch.
    pub fn ensure_full(&self, height: u32) -> Arc<EthashFull> {
        let epoch = epoch_of(height);
        let mut maps = self.inner.lock();
        if let Some(full) = maps.full.get(&epoch) {
            return Arc::clone(full);
        }
        let light = Arc::clone(
            maps.light
                .entry(epoch)
                .or_insert_with(|| Arc::new(EthashLight::new(height))),
        );
        if let Some(progress) = &self.progress {
            progress(epoch, 0);
        }
        info!(epoch, "Generating full Ethash DAG");
        let full = Arc::new(EthashFull::generate(&light));
        if let Some(progress) = &self.progress {
            progress(epoch, 100);
        }
        info!(epoch, "Full Ethash DAG ready");
        maps.full.insert(epoch, Arc::clone(&full));
        full
    }

    /// The full dataset for `height`'s epoch, if already built.
    pub fn get_full(&self, height: u32) -> Option<Arc<EthashFull>> {
        self.inner.lock().full.get(&epoch_of(height)).cloned()
    }

    /// Whether the light cache for `height`'s epoch exists.
    pub fn has_light(&self, height: u32) -> bool {
        self.inner.lock().light.contains_key(&epoch_of(height))
    }

    /// Drop both handles of `height`'s epoch. Workers holding the full
    /// handle keep it alive until they finish.
    pub fn evict(&self, height: u32) {
        let epoch = epoch_of(height);
        let mut maps = self.inner.lock();
        maps.light.remove(&epoch);
        maps.full.remove(&epoch);
    }

    /// Drop everything.
    pub fn shutdown(&self) {
        let mut maps = self.inner.lock();
        let count = maps.light.len() + maps.full.len();
        maps.light.clear();
        maps.full.clear();
        if count > 0 {
            info!(handles = count, "DAG cache cleared");
        }
    }

    /// Cached (light, full) handle counts.
    pub fn sizes(&self) -> (usize, usize) {
        let maps = self.inner.lock();
        (maps.light.len(), maps.full.len())
    }
}

impl Default for DagCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Drop for DagCache {
    fn drop(&mut self) {
        self.shutdown();
    }
}
