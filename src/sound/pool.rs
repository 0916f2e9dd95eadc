use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Sound ids currently eligible for playback.
///
/// The whole list is swapped on every catalog refresh; readers clone the
/// `Arc` under the read lock, so a pick never sees a half-installed list and
/// never holds the lock while choosing.
#[derive(Debug, Default)]
pub struct SoundPool {
    ids: RwLock<Arc<[String]>>,
}

impl SoundPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the previous ids and installs `ids`.
    pub fn replace(&self, ids: Vec<String>) {
        let ids: Arc<[String]> = ids.into();
        *self.ids.write() = ids;
    }

    /// One id chosen uniformly at random, or `None` while the pool is empty.
    pub fn pick_random(&self) -> Option<String> {
        let ids = self.snapshot();
        ids.choose(&mut rand::thread_rng()).cloned()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ids.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current ids, in install order.
    pub fn snapshot(&self) -> Arc<[String]> {
        self.ids.read().clone()
    }
}
