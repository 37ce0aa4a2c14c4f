//! Interpreted backend
//!
//! Walks the checked tree directly, one statement at a time per sample, with
//! state slots pre-bound at check time. Slower than the lowered op list but
//! fully portable and handy as a semantic reference: both backends must
//! produce identical audio for identical programs.

use crate::dsp::{self, DspState};
use crate::program::{CChain, CExpr, CSource, CStage, CheckedProgram, Operand, Target};

struct Ctx<'a, 'b> {
    inputs: &'a [&'b [f32]],
    controls: &'a mut [f32],
    buses: &'a mut [f32],
    state: &'a mut DspState,
    sample_rate: f32,
    frame: usize,
}

impl Ctx<'_, '_> {
    fn operand(&self, op: Operand) -> f32 {
        match op {
            Operand::Const(v) => v,
            Operand::Control(c) => self.controls[c as usize],
            Operand::Bus(b) => self.buses[b as usize],
        }
    }

    fn eval_expr(&mut self, expr: &CExpr) -> f32 {
        match expr {
            CExpr::Chain(chain) => self.eval_chain(chain),
            CExpr::Sum(a, b) => self.eval_expr(a) + self.eval_expr(b),
        }
    }

    fn eval_chain(&mut self, chain: &CChain) -> f32 {
        let mut value = match &chain.source {
            CSource::Const(v) => *v,
            CSource::Input { channel } => self
                .inputs
                .get(*channel as usize)
                .and_then(|buf| buf.get(self.frame))
                .copied()
                .unwrap_or(0.0),
            CSource::Bus(b) => self.buses[*b as usize],
            CSource::Control(c) => self.controls[*c as usize],
            CSource::Osc { wave, freq, state } => {
                let freq = self.operand(*freq);
                let phase = &mut self.state.phases[*state as usize];
                let sample = dsp::osc_sample(*wave, *phase);
                dsp::advance_phase(phase, freq, self.sample_rate);
                sample
            }
            CSource::Noise { state } => self.state.noises[*state as usize].next(),
        };

        for stage in &chain.stages {
            value = match stage {
                CStage::Mul(a) => value * self.operand(*a),
                CStage::Add(a) => value + self.operand(*a),
                CStage::LowPass { cutoff, state, .. } => {
                    let cutoff = self.operand(*cutoff);
                    dsp::one_pole_lpf(
                        &mut self.state.filters[*state as usize],
                        value,
                        cutoff,
                        self.sample_rate,
                    )
                }
                CStage::HighPass { cutoff, state, .. } => {
                    let cutoff = self.operand(*cutoff);
                    dsp::one_pole_hpf(
                        &mut self.state.filters[*state as usize],
                        value,
                        cutoff,
                        self.sample_rate,
                    )
                }
                CStage::Delay {
                    time,
                    feedback,
                    line,
                } => {
                    let time = self.operand(*time).max(0.0);
                    let feedback = self.operand(*feedback);
                    let delay_samples = (time * self.sample_rate) as usize;
                    self.state.delays[*line as usize].process(value, delay_samples, feedback)
                }
                CStage::Clip { lo, hi } => {
                    let lo = self.operand(*lo);
                    let hi = self.operand(*hi);
                    value.max(lo).min(hi)
                }
                CStage::Meter { control } => {
                    self.controls[*control as usize] = value;
                    value
                }
            };
        }

        value
    }
}

/// Execute one block by direct tree walking.
#[allow(clippy::too_many_arguments)]
pub fn run(
    program: &CheckedProgram,
    frames: usize,
    inputs: &[&[f32]],
    outputs: &mut [&mut [f32]],
    controls: &mut [f32],
    buses: &mut [f32],
    state: &mut DspState,
    sample_rate: f32,
) {
    for i in 0..frames {
        let mut ctx = Ctx {
            inputs,
            controls: &mut *controls,
            buses: &mut *buses,
            state: &mut *state,
            sample_rate,
            frame: i,
        };
        for statement in &program.statements {
            let value = ctx.eval_expr(&statement.expr);
            match statement.target {
                Target::Bus(b) => ctx.buses[b as usize] = value,
                Target::Output(channel) => {
                    if let Some(out) = outputs.get_mut(channel as usize) {
                        out[i] = value;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::program::check;

    fn run_program(source: &str, frames: usize) -> Vec<f32> {
        let program = check(&parse(source).unwrap()).unwrap();
        let mut state = DspState::for_layout(&program.meta.state, 48000);
        let mut buses = vec![0.0; program.meta.num_buses];
        let mut controls = vec![0.0; program.meta.controls.len()];
        let mut out = vec![0.0f32; frames];
        let mut outputs: Vec<&mut [f32]> = vec![&mut out];
        run(
            &program,
            frames,
            &[],
            &mut outputs,
            &mut controls,
            &mut buses,
            &mut state,
            48000.0,
        );
        out
    }

    #[test]
    fn test_bus_feeds_output() {
        let out = run_program("~a: 1 >> mul 0.5\nout: ~a >> add 0.25", 4);
        assert!(out.iter().all(|&s| (s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn test_sum_mixes_chains() {
        let out = run_program("out: 1 >> mul 0.5 + 1 >> mul 0.25", 4);
        assert!(out.iter().all(|&s| (s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn test_sine_rms_is_plausible() {
        let out = run_program("out: sin 440 >> mul 0.5", 48000);
        let rms = (out.iter().map(|s| s * s).sum::<f32>() / out.len() as f32).sqrt();
        assert!((rms - 0.3535).abs() < 0.01, "rms {rms} off for 0.5 sine");
    }
}
