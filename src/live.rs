//! Published parameter view for UI and control threads
//!
//! The host republishes its parameter interface through an atomic slot on
//! every program swap. Holders of a `LiveParams` clone never touch the host:
//! they load whatever interface is current and read/write through it. A
//! reader that loaded just before a swap keeps the old interface (and its
//! control block) alive until it lets go. Stale but harmless, and lock-free.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::params::Params;

/// Cloneable, thread-safe handle to the currently published parameters.
#[derive(Clone)]
pub struct LiveParams {
    slot: Arc<ArcSwapOption<Params>>,
}

impl LiveParams {
    pub(crate) fn new() -> Self {
        Self {
            slot: Arc::new(ArcSwapOption::empty()),
        }
    }

    pub(crate) fn publish(&self, params: Option<Arc<Params>>) {
        self.slot.store(params);
    }

    /// Snapshot of the currently published interface, if any.
    pub fn load(&self) -> Option<Arc<Params>> {
        self.slot.load_full()
    }

    pub fn param_count(&self) -> usize {
        self.load().map_or(0, |p| p.len())
    }

    pub fn value(&self, index: usize) -> f32 {
        self.load().map_or(0.0, |p| p.value(index))
    }

    pub fn set_value(&self, index: usize, ratio: f32) {
        if let Some(params) = self.load() {
            params.set_value(index, ratio);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ControlBlock;
    use crate::program::{ControlDef, WidgetKind};

    fn some_params() -> Arc<Params> {
        let controls = vec![ControlDef {
            kind: WidgetKind::HSlider,
            label: "Gain".into(),
            init: 0.5,
            min: 0.0,
            max: 1.0,
        }];
        let block = Arc::new(ControlBlock::new(&controls));
        Arc::new(Params::new(&controls, block))
    }

    #[test]
    fn test_empty_view_is_neutral() {
        let view = LiveParams::new();
        assert_eq!(view.param_count(), 0);
        assert_eq!(view.value(0), 0.0);
        view.set_value(0, 0.5); // must not panic
    }

    #[test]
    fn test_publish_and_replace() {
        let view = LiveParams::new();
        let reader = view.clone();

        view.publish(Some(some_params()));
        assert_eq!(reader.param_count(), 1);

        // A snapshot taken before unpublishing keeps working.
        let stale = reader.load().unwrap();
        view.publish(None);
        assert_eq!(reader.param_count(), 0);
        assert!((stale.value(0) - 0.5).abs() < 1e-6);
    }
}
