//! Runtime instance: the executable processor
//!
//! Bound to one program image and one sample rate for its whole lifetime.
//! All state (oscillator phases, filter memories, delay lines, the control
//! snapshot and the register/bus work buffer) is allocated here, at
//! instantiation, so `compute` touches no allocator and takes no lock.

use std::sync::Arc;

use crate::dsp::DspState;
use crate::factory::ProgramImage;
use crate::interp;
use crate::params::{ControlBlock, Params};

pub struct RuntimeInstance {
    image: Arc<ProgramImage>,
    controls: Arc<ControlBlock>,
    sample_rate: u32,
    state: DspState,
    /// Denormalized control snapshot, refreshed at block start; meters write
    /// into it and are flushed back after the block.
    scratch: Vec<f32>,
    /// Registers (lowered backend) or bus values (interpreted backend).
    work: Vec<f32>,
}

impl RuntimeInstance {
    pub(crate) fn new(image: Arc<ProgramImage>, sample_rate: u32) -> Self {
        let meta = image.meta();
        let controls = Arc::new(ControlBlock::new(&meta.controls));
        let state = DspState::for_layout(&meta.state, sample_rate);
        let scratch = vec![0.0; meta.controls.len()];
        let work = vec![
            0.0;
            match &*image {
                ProgramImage::Compiled(p) => p.num_regs(),
                ProgramImage::Interpreted(p) => p.meta.num_buses,
            }
        ];
        Self {
            image,
            controls,
            sample_rate,
            state,
            scratch,
            work,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_inputs(&self) -> usize {
        self.image.meta().num_inputs
    }

    pub fn num_outputs(&self) -> usize {
        self.image.meta().num_outputs
    }

    /// Populate the parameter interface for this instance. Entries share the
    /// instance's control block, so interface writes are heard on the next
    /// computed block.
    pub fn build_params(&self) -> Params {
        Params::new(&self.image.meta().controls, self.controls.clone())
    }

    /// Process exactly `frames` frames (bounded by the shortest buffer the
    /// caller actually provided). Real-time safe: no allocation, no locks,
    /// no panicking paths.
    pub fn compute(&mut self, frames: usize, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        let mut frames = frames;
        for buf in inputs.iter() {
            frames = frames.min(buf.len());
        }
        for buf in outputs.iter() {
            frames = frames.min(buf.len());
        }
        if frames == 0 {
            return;
        }

        self.controls.snapshot_into(&mut self.scratch);

        let sample_rate = self.sample_rate as f32;
        match &*self.image {
            ProgramImage::Compiled(p) => p.run(
                frames,
                inputs,
                outputs,
                &mut self.scratch,
                &mut self.work,
                &mut self.state,
                sample_rate,
            ),
            ProgramImage::Interpreted(p) => interp::run(
                p,
                frames,
                inputs,
                outputs,
                &mut self.scratch,
                &mut self.work,
                &mut self.state,
                sample_rate,
            ),
        }

        for &control in &self.image.meta().meters {
            self.controls
                .store_raw(control as usize, self.scratch[control as usize]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{compile_source, Backend};

    #[test]
    fn test_channel_counts_come_from_program() {
        let factory = compile_source("out: in 0 >> mul 0.5, in 1", Backend::Compiled).unwrap();
        let instance = factory.instantiate(48000);
        assert_eq!(instance.num_inputs(), 2);
        assert_eq!(instance.num_outputs(), 2);
        assert_eq!(instance.sample_rate(), 48000);
    }

    #[test]
    fn test_compute_writes_every_frame() {
        let factory = compile_source("out: 1 >> mul 0.5", Backend::Interpreted).unwrap();
        let mut instance = factory.instantiate(48000);
        let mut out = vec![-1.0f32; 32];
        let mut outputs: Vec<&mut [f32]> = vec![&mut out];
        instance.compute(32, &[], &mut outputs);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_compute_zero_frames_is_a_noop() {
        let factory = compile_source("out: 1", Backend::Compiled).unwrap();
        let mut instance = factory.instantiate(48000);
        let mut out = vec![-1.0f32; 8];
        let mut outputs: Vec<&mut [f32]> = vec![&mut out];
        instance.compute(0, &[], &mut outputs);
        assert!(out.iter().all(|&s| s == -1.0));
    }

    #[test]
    fn test_compute_is_bounded_by_short_buffers() {
        let factory = compile_source("out: 1", Backend::Compiled).unwrap();
        let mut instance = factory.instantiate(48000);
        let mut out = vec![-1.0f32; 4];
        let mut outputs: Vec<&mut [f32]> = vec![&mut out];
        // Asking for more frames than the buffer holds must not panic.
        instance.compute(64, &[], &mut outputs);
        assert!(out.iter().all(|&s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_control_write_is_heard_next_block() {
        let factory =
            compile_source("~g: slider \"Gain\" 1.0 0.0 1.0\nout: 1 >> mul ~g", Backend::Compiled)
                .unwrap();
        let mut instance = factory.instantiate(48000);
        let params = instance.build_params();

        let mut out = vec![0.0f32; 8];
        let mut outputs: Vec<&mut [f32]> = vec![&mut out];
        instance.compute(8, &[], &mut outputs);
        assert!((out[0] - 1.0).abs() < 1e-6);

        params.set_value(0, 0.25);
        let mut outputs: Vec<&mut [f32]> = vec![&mut out];
        instance.compute(8, &[], &mut outputs);
        assert!((out[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_meter_is_readable_after_block() {
        let factory = compile_source(
            "out: 1 >> mul 0.5 >> meter \"Level\" 0 1",
            Backend::Interpreted,
        )
        .unwrap();
        let mut instance = factory.instantiate(48000);
        let params = instance.build_params();

        let mut out = vec![0.0f32; 8];
        let mut outputs: Vec<&mut [f32]> = vec![&mut out];
        instance.compute(8, &[], &mut outputs);
        assert!((params.value(0) - 0.5).abs() < 1e-6);
    }
}
