//! Ahead-of-time backend
//!
//! Lowers a checked program into a flat, register-addressed op list that the
//! audio path executes in a tight per-sample loop with no tree traversal.
//! Registers `[0, num_buses)` hold bus values; scratch registers above them
//! are allocated per statement with stack discipline.

use crate::dsp::{self, DspState};
use crate::program::{
    CChain, CExpr, CSource, CStage, CheckedProgram, Operand, ProgramMeta, Target, Waveform,
};

#[derive(Debug, Clone, Copy)]
pub enum Src {
    Reg(u16),
    Const(f32),
    Control(u16),
}

impl Src {
    fn from_operand(op: Operand) -> Self {
        match op {
            Operand::Const(v) => Src::Const(v),
            Operand::Control(c) => Src::Control(c),
            // Buses live in the low registers.
            Operand::Bus(b) => Src::Reg(b),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Op {
    Const {
        dst: u16,
        value: f32,
    },
    Input {
        dst: u16,
        channel: u16,
    },
    ReadControl {
        dst: u16,
        control: u16,
    },
    Copy {
        dst: u16,
        src: u16,
    },
    Osc {
        dst: u16,
        wave: Waveform,
        freq: Src,
        state: u16,
    },
    Noise {
        dst: u16,
        state: u16,
    },
    Mul {
        dst: u16,
        src: Src,
    },
    Add {
        dst: u16,
        src: Src,
    },
    LowPass {
        dst: u16,
        cutoff: Src,
        state: u16,
    },
    HighPass {
        dst: u16,
        cutoff: Src,
        state: u16,
    },
    Delay {
        dst: u16,
        time: Src,
        feedback: Src,
        line: u16,
    },
    Clip {
        dst: u16,
        lo: Src,
        hi: Src,
    },
    Meter {
        src: u16,
        control: u16,
    },
    Output {
        channel: u16,
        src: u16,
    },
}

/// The compiled image: ops plus the metadata shared by both backends.
#[derive(Debug, Clone)]
pub struct OpProgram {
    pub meta: ProgramMeta,
    ops: Vec<Op>,
    num_regs: usize,
}

struct Lowerer {
    ops: Vec<Op>,
    num_buses: u16,
    scratch_top: u16,
    scratch_max: u16,
}

impl Lowerer {
    fn alloc(&mut self) -> u16 {
        let reg = self.num_buses + self.scratch_top;
        self.scratch_top += 1;
        self.scratch_max = self.scratch_max.max(self.scratch_top);
        reg
    }

    fn release(&mut self) {
        self.scratch_top -= 1;
    }

    fn lower_expr(&mut self, expr: &CExpr, dst: u16) {
        match expr {
            CExpr::Chain(chain) => self.lower_chain(chain, dst),
            CExpr::Sum(a, b) => {
                self.lower_expr(a, dst);
                let tmp = self.alloc();
                self.lower_expr(b, tmp);
                self.ops.push(Op::Add {
                    dst,
                    src: Src::Reg(tmp),
                });
                self.release();
            }
        }
    }

    fn lower_chain(&mut self, chain: &CChain, dst: u16) {
        match &chain.source {
            CSource::Const(v) => self.ops.push(Op::Const { dst, value: *v }),
            CSource::Input { channel } => self.ops.push(Op::Input {
                dst,
                channel: *channel,
            }),
            CSource::Bus(bus) => self.ops.push(Op::Copy { dst, src: *bus }),
            CSource::Control(control) => self.ops.push(Op::ReadControl {
                dst,
                control: *control,
            }),
            CSource::Osc { wave, freq, state } => self.ops.push(Op::Osc {
                dst,
                wave: *wave,
                freq: Src::from_operand(*freq),
                state: *state,
            }),
            CSource::Noise { state } => self.ops.push(Op::Noise { dst, state: *state }),
        }

        for stage in &chain.stages {
            let op = match stage {
                CStage::Mul(a) => Op::Mul {
                    dst,
                    src: Src::from_operand(*a),
                },
                CStage::Add(a) => Op::Add {
                    dst,
                    src: Src::from_operand(*a),
                },
                CStage::LowPass { cutoff, state, .. } => Op::LowPass {
                    dst,
                    cutoff: Src::from_operand(*cutoff),
                    state: *state,
                },
                CStage::HighPass { cutoff, state, .. } => Op::HighPass {
                    dst,
                    cutoff: Src::from_operand(*cutoff),
                    state: *state,
                },
                CStage::Delay {
                    time,
                    feedback,
                    line,
                } => Op::Delay {
                    dst,
                    time: Src::from_operand(*time),
                    feedback: Src::from_operand(*feedback),
                    line: *line,
                },
                CStage::Clip { lo, hi } => Op::Clip {
                    dst,
                    lo: Src::from_operand(*lo),
                    hi: Src::from_operand(*hi),
                },
                CStage::Meter { control } => Op::Meter {
                    src: dst,
                    control: *control,
                },
            };
            self.ops.push(op);
        }
    }
}

/// Lower a checked program to its op-list image.
pub fn lower(program: &CheckedProgram) -> OpProgram {
    let mut lowerer = Lowerer {
        ops: Vec::new(),
        num_buses: program.meta.num_buses as u16,
        scratch_top: 0,
        scratch_max: 0,
    };

    for statement in &program.statements {
        lowerer.scratch_top = 0;
        match statement.target {
            Target::Bus(bus) => lowerer.lower_expr(&statement.expr, bus),
            Target::Output(channel) => {
                let reg = lowerer.alloc();
                lowerer.lower_expr(&statement.expr, reg);
                lowerer.ops.push(Op::Output { channel, src: reg });
                lowerer.release();
            }
        }
    }

    OpProgram {
        meta: program.meta.clone(),
        ops: lowerer.ops,
        num_regs: program.meta.num_buses + lowerer.scratch_max as usize,
    }
}

impl OpProgram {
    pub fn num_regs(&self) -> usize {
        self.num_regs
    }

    /// Execute one block. `controls` holds the block's denormalized control
    /// snapshot and receives meter writes; all buffers are caller-allocated.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &self,
        frames: usize,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        controls: &mut [f32],
        regs: &mut [f32],
        state: &mut DspState,
        sample_rate: f32,
    ) {
        for i in 0..frames {
            for op in &self.ops {
                match op {
                    Op::Const { dst, value } => regs[*dst as usize] = *value,
                    Op::Input { dst, channel } => {
                        regs[*dst as usize] = inputs
                            .get(*channel as usize)
                            .and_then(|buf| buf.get(i))
                            .copied()
                            .unwrap_or(0.0);
                    }
                    Op::ReadControl { dst, control } => {
                        regs[*dst as usize] = controls[*control as usize];
                    }
                    Op::Copy { dst, src } => regs[*dst as usize] = regs[*src as usize],
                    Op::Osc {
                        dst,
                        wave,
                        freq,
                        state: slot,
                    } => {
                        let freq = load(*freq, regs, controls);
                        let phase = &mut state.phases[*slot as usize];
                        regs[*dst as usize] = dsp::osc_sample(*wave, *phase);
                        dsp::advance_phase(phase, freq, sample_rate);
                    }
                    Op::Noise { dst, state: slot } => {
                        regs[*dst as usize] = state.noises[*slot as usize].next();
                    }
                    Op::Mul { dst, src } => {
                        let value = load(*src, regs, controls);
                        regs[*dst as usize] *= value;
                    }
                    Op::Add { dst, src } => {
                        let value = load(*src, regs, controls);
                        regs[*dst as usize] += value;
                    }
                    Op::LowPass {
                        dst,
                        cutoff,
                        state: slot,
                    } => {
                        let cutoff = load(*cutoff, regs, controls);
                        regs[*dst as usize] = dsp::one_pole_lpf(
                            &mut state.filters[*slot as usize],
                            regs[*dst as usize],
                            cutoff,
                            sample_rate,
                        );
                    }
                    Op::HighPass {
                        dst,
                        cutoff,
                        state: slot,
                    } => {
                        let cutoff = load(*cutoff, regs, controls);
                        regs[*dst as usize] = dsp::one_pole_hpf(
                            &mut state.filters[*slot as usize],
                            regs[*dst as usize],
                            cutoff,
                            sample_rate,
                        );
                    }
                    Op::Delay {
                        dst,
                        time,
                        feedback,
                        line,
                    } => {
                        let time = load(*time, regs, controls).max(0.0);
                        let feedback = load(*feedback, regs, controls);
                        let delay_samples = (time * sample_rate) as usize;
                        regs[*dst as usize] = state.delays[*line as usize].process(
                            regs[*dst as usize],
                            delay_samples,
                            feedback,
                        );
                    }
                    Op::Clip { dst, lo, hi } => {
                        let lo = load(*lo, regs, controls);
                        let hi = load(*hi, regs, controls);
                        regs[*dst as usize] = regs[*dst as usize].max(lo).min(hi);
                    }
                    Op::Meter { src, control } => {
                        controls[*control as usize] = regs[*src as usize];
                    }
                    Op::Output { channel, src } => {
                        if let Some(out) = outputs.get_mut(*channel as usize) {
                            out[i] = regs[*src as usize];
                        }
                    }
                }
            }
        }
    }
}

#[inline]
fn load(src: Src, regs: &[f32], controls: &[f32]) -> f32 {
    match src {
        Src::Reg(r) => regs[r as usize],
        Src::Const(v) => v,
        Src::Control(c) => controls[c as usize],
    }
}
