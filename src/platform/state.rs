//! Lazily resolved per-variant state

use crate::platform::cipher::RuleEvaluator;
use crate::platform::variant::ClientVariant;
use crate::utils::memo::Memo;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// State of one client variant: player script, its rule evaluator and the
/// service worker metadata.
///
/// Every slot is filled on first use. Concurrent first fills may race and
/// fetch twice; they converge on the same value. A fill is committed only
/// if no reset happened since the fill started.
#[derive(Default)]
pub struct VariantState {
    epoch: RwLock<u64>,
    pub script_url: Memo<String>,
    pub script: Memo<Arc<str>>,
    pub evaluator: Memo<Arc<dyn RuleEvaluator>>,
    pub signature_timestamp: Memo<u32>,
    pub service_worker: Memo<Arc<Vec<Value>>>,
    pub client_version: Memo<String>,
    pub visitor_id: Memo<String>,
}

impl VariantState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Epoch to pass to [`VariantState::commit`] once the value is computed
    pub fn epoch(&self) -> u64 {
        *self.epoch.read()
    }

    /// Store `value` in `slot` unless the state was reset after `epoch`.
    ///
    /// The value is returned either way so the caller can still use it.
    pub fn commit<T: Clone>(&self, slot: &Memo<T>, epoch: u64, value: T) -> T {
        let current = self.epoch.read();
        if *current == epoch {
            slot.set(value.clone());
        }
        value
    }

    /// Clear every slot
    pub fn reset(&self) {
        let mut epoch = self.epoch.write();
        *epoch = epoch.wrapping_add(1);
        self.script_url.clear();
        self.script.clear();
        self.evaluator.clear();
        self.signature_timestamp.clear();
        self.service_worker.clear();
        self.client_version.clear();
        self.visitor_id.clear();
    }

    /// True when no slot holds a value
    pub fn is_empty(&self) -> bool {
        !(self.script_url.is_set()
            || self.script.is_set()
            || self.evaluator.is_set()
            || self.signature_timestamp.is_set()
            || self.service_worker.is_set()
            || self.client_version.is_set()
            || self.visitor_id.is_set())
    }
}

/// One [`VariantState`] per [`ClientVariant`]
#[derive(Default)]
pub struct VariantSlots {
    mobile_web: VariantState,
    tv: VariantState,
}

impl VariantSlots {
    pub fn get(&self, variant: ClientVariant) -> &VariantState {
        match variant {
            ClientVariant::MobileWeb => &self.mobile_web,
            ClientVariant::Tv => &self.tv,
        }
    }

    pub fn reset_all(&self) {
        self.mobile_web.reset();
        self.tv.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_and_reset() {
        let state = VariantState::new();
        assert!(state.is_empty());

        let epoch = state.epoch();
        let url = state.commit(&state.script_url, epoch, "https://x.test/base.js".to_string());
        assert_eq!(url, "https://x.test/base.js");
        assert_eq!(state.script_url.get(), Some(url));
        assert!(!state.is_empty());

        state.reset();
        assert!(state.is_empty());
    }

    #[test]
    fn test_stale_commit_is_dropped() {
        let state = VariantState::new();
        let epoch = state.epoch();

        // A reset lands while the value is still being computed
        state.reset();
        let value = state.commit(&state.signature_timestamp, epoch, 20000);

        assert_eq!(value, 20000);
        assert_eq!(state.signature_timestamp.get(), None);

        let epoch = state.epoch();
        state.commit(&state.signature_timestamp, epoch, 20001);
        assert_eq!(state.signature_timestamp.get(), Some(20001));
    }

    #[test]
    fn test_variants_are_independent() {
        let slots = VariantSlots::default();
        let tv = slots.get(ClientVariant::Tv);
        tv.commit(&tv.visitor_id, tv.epoch(), "visitor".to_string());

        assert!(!slots.get(ClientVariant::Tv).is_empty());
        assert!(slots.get(ClientVariant::MobileWeb).is_empty());

        slots.reset_all();
        assert!(slots.get(ClientVariant::Tv).is_empty());
    }
}
