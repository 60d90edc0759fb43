//! Shared current-configuration cell.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::model::EffectiveConfig;

/// Lock-free handle to the most recently installed configuration.
///
/// Readers on any thread load the current snapshot without locking.
/// Only the operational watcher replaces it, always as a whole.
#[derive(Clone)]
pub struct ConfigCell {
    inner: Arc<ArcSwap<EffectiveConfig>>,
}

impl ConfigCell {
    pub fn new(initial: EffectiveConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<EffectiveConfig> {
        self.inner.load_full()
    }

    /// Read one value from the current snapshot.
    pub fn read<T>(&self, f: impl FnOnce(&EffectiveConfig) -> T) -> T {
        f(&self.inner.load())
    }

    /// Install a new snapshot, returning the one it replaced.
    pub(crate) fn replace(&self, config: EffectiveConfig) -> Arc<EffectiveConfig> {
        self.inner.swap(Arc::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartialConfig;

    #[test]
    fn test_replace_is_visible_to_clones() {
        let cell = ConfigCell::new(EffectiveConfig::default());
        let reader = cell.clone();
        let before = reader.load();

        let updated = EffectiveConfig::fill_default(&PartialConfig {
            max_redirections: Some(42),
            ..Default::default()
        });
        let previous = cell.replace(updated.clone());

        assert_eq!(*previous, EffectiveConfig::default());
        assert_eq!(reader.read(|c| c.max_redirections()), 42);
        // Earlier loads keep their snapshot.
        assert_eq!(before.max_redirections(), 100);
    }
}
