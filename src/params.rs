//! Parameter interface: metadata and live values
//!
//! Controls declared in source become an ordered, immutable metadata table
//! plus one atomic value cell per entry. Metadata accessors return `Option`
//! for out-of-range indices; the hot-path value accessors are silently
//! tolerant instead, because UI threads legitimately race program swaps.
//! Cells store the denormalized value; the host-facing surface speaks
//! normalized [0, 1] ratios of the declared range.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::program::{ControlDef, WidgetKind};

/// Reduced widget taxonomy exposed to hosts.
///
/// Display-only widgets (meters) are outputs, not inputs, and collapse to
/// `Unavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Unavailable,
    Slider,
    Button,
    CheckButton,
}

impl ParamKind {
    /// Map the language's native widget taxonomy onto the reduced set.
    pub fn from_widget(kind: WidgetKind) -> Self {
        match kind {
            WidgetKind::HSlider | WidgetKind::VSlider | WidgetKind::NumEntry => ParamKind::Slider,
            WidgetKind::Button => ParamKind::Button,
            WidgetKind::CheckBox => ParamKind::CheckButton,
            WidgetKind::HMeter | WidgetKind::VMeter => ParamKind::Unavailable,
        }
    }
}

/// Immutable metadata for one declared parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub label: String,
    pub init: f64,
    pub min: f64,
    pub max: f64,
}

impl ParamSpec {
    fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// One atomic f32 cell per declared control, shared between the running
/// instance and every parameter-interface handle.
#[derive(Debug)]
pub struct ControlBlock {
    cells: Vec<AtomicU32>,
}

impl ControlBlock {
    pub fn new(controls: &[ControlDef]) -> Self {
        Self {
            cells: controls
                .iter()
                .map(|c| AtomicU32::new((c.init as f32).to_bits()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Denormalized value of cell `index`; 0.0 when out of range.
    pub fn raw(&self, index: usize) -> f32 {
        self.cells
            .get(index)
            .map_or(0.0, |cell| f32::from_bits(cell.load(Ordering::Relaxed)))
    }

    pub fn store_raw(&self, index: usize, value: f32) {
        if let Some(cell) = self.cells.get(index) {
            cell.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Copy every cell into `dst` (the per-block control snapshot).
    pub fn snapshot_into(&self, dst: &mut [f32]) {
        for (slot, cell) in dst.iter_mut().zip(&self.cells) {
            *slot = f32::from_bits(cell.load(Ordering::Relaxed));
        }
    }
}

/// Ordered parameter metadata plus shared live values.
///
/// Valid only while built from a live program; stale handles keep working
/// against their own control block (reads and writes just stop being heard).
#[derive(Debug)]
pub struct Params {
    specs: Vec<ParamSpec>,
    block: Arc<ControlBlock>,
}

impl Params {
    pub(crate) fn new(controls: &[ControlDef], block: Arc<ControlBlock>) -> Self {
        Self {
            specs: controls
                .iter()
                .map(|c| ParamSpec {
                    kind: ParamKind::from_widget(c.kind),
                    label: c.label.clone(),
                    init: c.init,
                    min: c.min,
                    max: c.max,
                })
                .collect(),
            block,
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Metadata for one parameter; `None` out of range.
    pub fn spec(&self, index: usize) -> Option<&ParamSpec> {
        self.specs.get(index)
    }

    /// Current value as a [0, 1] ratio of the declared range; 0.0 out of
    /// range. Safe on any thread.
    pub fn value(&self, index: usize) -> f32 {
        let Some(spec) = self.specs.get(index) else {
            return 0.0;
        };
        let span = spec.span();
        if span.abs() <= f64::EPSILON {
            return 0.0;
        }
        let ratio = (self.block.raw(index) as f64 - spec.min) / span;
        ratio.clamp(0.0, 1.0) as f32
    }

    /// Write a [0, 1] ratio (clamped). No-op out of range, and no-op for
    /// display-only parameters, which the running program owns.
    pub fn set_value(&self, index: usize, ratio: f32) {
        let Some(spec) = self.specs.get(index) else {
            return;
        };
        if spec.kind == ParamKind::Unavailable {
            return;
        }
        let ratio = f64::from(ratio.clamp(0.0, 1.0));
        self.block
            .store_raw(index, (spec.min + ratio * spec.span()) as f32);
    }

    pub(crate) fn block(&self) -> &Arc<ControlBlock> {
        &self.block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(kind: WidgetKind, label: &str, init: f64, min: f64, max: f64) -> ControlDef {
        ControlDef {
            kind,
            label: label.into(),
            init,
            min,
            max,
        }
    }

    fn params(controls: Vec<ControlDef>) -> Params {
        let block = Arc::new(ControlBlock::new(&controls));
        Params::new(&controls, block)
    }

    #[test]
    fn test_widget_reduction() {
        assert_eq!(ParamKind::from_widget(WidgetKind::HSlider), ParamKind::Slider);
        assert_eq!(ParamKind::from_widget(WidgetKind::VSlider), ParamKind::Slider);
        assert_eq!(ParamKind::from_widget(WidgetKind::NumEntry), ParamKind::Slider);
        assert_eq!(ParamKind::from_widget(WidgetKind::Button), ParamKind::Button);
        assert_eq!(
            ParamKind::from_widget(WidgetKind::CheckBox),
            ParamKind::CheckButton
        );
        assert_eq!(
            ParamKind::from_widget(WidgetKind::HMeter),
            ParamKind::Unavailable
        );
        assert_eq!(
            ParamKind::from_widget(WidgetKind::VMeter),
            ParamKind::Unavailable
        );
    }

    #[test]
    fn test_initial_value_is_declared_default() {
        let p = params(vec![control(WidgetKind::HSlider, "Freq", 440.0, 20.0, 2000.0)]);
        let expected = (440.0 - 20.0) / (2000.0 - 20.0);
        assert!((f64::from(p.value(0)) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_set_value_round_trips() {
        let p = params(vec![control(WidgetKind::HSlider, "Gain", 0.5, 0.0, 1.0)]);
        for ratio in [0.0, 0.25, 0.5, 0.99, 1.0] {
            p.set_value(0, ratio);
            assert!((p.value(0) - ratio).abs() < 1e-6);
        }
    }

    #[test]
    fn test_set_value_clamps_out_of_domain_ratio() {
        let p = params(vec![control(WidgetKind::HSlider, "Gain", 0.5, 0.0, 1.0)]);
        p.set_value(0, 1.5);
        assert!((p.value(0) - 1.0).abs() < 1e-6);
        p.set_value(0, -0.5);
        assert!(p.value(0).abs() < 1e-6);
    }

    #[test]
    fn test_out_of_range_index_is_neutral() {
        let p = params(vec![control(WidgetKind::HSlider, "Gain", 0.5, 0.0, 1.0)]);
        assert!(p.spec(5).is_none());
        assert_eq!(p.value(5), 0.0);
        p.set_value(5, 0.7); // must not panic
    }

    #[test]
    fn test_meter_rejects_host_writes() {
        let p = params(vec![control(WidgetKind::HMeter, "Level", 0.0, 0.0, 1.0)]);
        p.set_value(0, 0.9);
        assert_eq!(p.value(0), 0.0);
    }

    #[test]
    fn test_degenerate_range_reads_zero() {
        let p = params(vec![control(WidgetKind::HSlider, "Fixed", 1.0, 1.0, 1.0)]);
        assert_eq!(p.value(0), 0.0);
    }
}
