//! Program representation for the signal language
//!
//! The parser produces a [`ProgramDef`]: raw statements that still refer to
//! buses and controls by name. [`check`] resolves every reference, collects
//! declared controls in source order, derives the channel counts, and binds
//! per-node DSP state slots, producing the [`CheckedProgram`] that both
//! backends execute. Checking is the last point where a program can fail;
//! everything downstream is infallible.

use std::collections::HashMap;

use crate::diagnostics::CompileError;

/// Widget taxonomy as declared in source.
///
/// This is the language's native set; hosts see the reduced
/// [`ParamKind`](crate::params::ParamKind) taxonomy instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    HSlider,
    VSlider,
    NumEntry,
    Button,
    CheckBox,
    HMeter,
    VMeter,
}

/// A control declared in source, in declaration order.
#[derive(Debug, Clone)]
pub struct ControlDef {
    pub kind: WidgetKind,
    pub label: String,
    pub init: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Triangle,
}

/// Unresolved argument: a literal or a `~name` reference.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(f64),
    Ref(String),
}

#[derive(Debug, Clone)]
pub enum Source {
    Osc { wave: Waveform, freq: Arg },
    Noise,
    Input { channel: usize },
    Const(f64),
    Ref(String),
}

#[derive(Debug, Clone)]
pub enum Stage {
    Mul(Arg),
    Add(Arg),
    LowPass { cutoff: Arg, q: Arg },
    HighPass { cutoff: Arg, q: Arg },
    Delay { time: Arg, feedback: Arg },
    Clip { lo: Arg, hi: Arg },
    /// Display-only level meter; declares an output-widget control inline.
    Meter(ControlDef),
}

/// A signal chain: a source followed by `>>` stages.
#[derive(Debug, Clone)]
pub struct Chain {
    pub source: Source,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Chain(Chain),
    Sum(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Statement {
    Bus {
        name: String,
        expr: Expr,
        line: usize,
    },
    Control {
        name: String,
        def: ControlDef,
        line: usize,
    },
    Output {
        chains: Vec<Expr>,
        line: usize,
    },
}

/// Raw parse result, before name resolution.
#[derive(Debug, Clone)]
pub struct ProgramDef {
    pub statements: Vec<Statement>,
}

// ---------------------------------------------------------------------------
// Checked form
// ---------------------------------------------------------------------------

/// Resolved argument: constant, live control value, or bus sample.
#[derive(Debug, Clone, Copy)]
pub enum Operand {
    Const(f32),
    Control(u16),
    Bus(u16),
}

#[derive(Debug, Clone)]
pub enum CSource {
    Osc {
        wave: Waveform,
        freq: Operand,
        state: u16,
    },
    Noise {
        state: u16,
    },
    Input {
        channel: u16,
    },
    Const(f32),
    Bus(u16),
    Control(u16),
}

#[derive(Debug, Clone)]
pub enum CStage {
    Mul(Operand),
    Add(Operand),
    LowPass {
        cutoff: Operand,
        q: Operand,
        state: u16,
    },
    HighPass {
        cutoff: Operand,
        q: Operand,
        state: u16,
    },
    Delay {
        time: Operand,
        feedback: Operand,
        line: u16,
    },
    Clip {
        lo: Operand,
        hi: Operand,
    },
    Meter {
        control: u16,
    },
}

#[derive(Debug, Clone)]
pub struct CChain {
    pub source: CSource,
    pub stages: Vec<CStage>,
}

#[derive(Debug, Clone)]
pub enum CExpr {
    Chain(CChain),
    Sum(Box<CExpr>, Box<CExpr>),
}

#[derive(Debug, Clone, Copy)]
pub enum Target {
    Bus(u16),
    Output(u16),
}

#[derive(Debug, Clone)]
pub struct CStatement {
    pub target: Target,
    pub expr: CExpr,
}

/// Per-instance DSP state slot counts, bound at check time so both backends
/// allocate identical state arenas.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateLayout {
    pub oscs: usize,
    pub filters: usize,
    pub noises: usize,
    pub delays: usize,
}

/// Everything a host needs to know about a program without executing it.
#[derive(Debug, Clone)]
pub struct ProgramMeta {
    /// Declared controls, ordinal position = declaration order in source.
    pub controls: Vec<ControlDef>,
    /// Control indices owned by meters; the instance flushes these back to
    /// the control block after each computed block.
    pub meters: Vec<u16>,
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub num_buses: usize,
    pub state: StateLayout,
}

/// A checked, reference-resolved program. Input to both backends.
#[derive(Debug, Clone)]
pub struct CheckedProgram {
    pub meta: ProgramMeta,
    pub statements: Vec<CStatement>,
}

// ---------------------------------------------------------------------------
// Checking
// ---------------------------------------------------------------------------

enum Symbol {
    Bus(u16),
    Control(u16),
}

struct Checker {
    symbols: HashMap<String, Symbol>,
    controls: Vec<ControlDef>,
    meters: Vec<u16>,
    num_buses: u16,
    max_input: Option<usize>,
    state: StateLayout,
}

const MAX_INPUT_CHANNELS: usize = 64;

impl Checker {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            controls: Vec::new(),
            meters: Vec::new(),
            num_buses: 0,
            max_input: None,
            state: StateLayout::default(),
        }
    }

    fn resolve_arg(&mut self, arg: &Arg, line: usize) -> Result<Operand, CompileError> {
        match arg {
            Arg::Value(v) => Ok(Operand::Const(*v as f32)),
            Arg::Ref(name) => match self.symbols.get(name) {
                Some(Symbol::Bus(idx)) => Ok(Operand::Bus(*idx)),
                Some(Symbol::Control(idx)) => Ok(Operand::Control(*idx)),
                None => Err(unknown_ref(name, line)),
            },
        }
    }

    fn resolve_source(&mut self, source: &Source, line: usize) -> Result<CSource, CompileError> {
        match source {
            Source::Osc { wave, freq } => {
                let freq = self.resolve_arg(freq, line)?;
                let state = self.state.oscs as u16;
                self.state.oscs += 1;
                Ok(CSource::Osc {
                    wave: *wave,
                    freq,
                    state,
                })
            }
            Source::Noise => {
                let state = self.state.noises as u16;
                self.state.noises += 1;
                Ok(CSource::Noise { state })
            }
            Source::Input { channel } => {
                if *channel >= MAX_INPUT_CHANNELS {
                    return Err(CompileError::at(
                        line,
                        1,
                        format!("input channel {channel} out of range"),
                    ));
                }
                self.max_input = Some(self.max_input.map_or(*channel, |m| m.max(*channel)));
                Ok(CSource::Input {
                    channel: *channel as u16,
                })
            }
            Source::Const(v) => Ok(CSource::Const(*v as f32)),
            Source::Ref(name) => match self.symbols.get(name) {
                Some(Symbol::Bus(idx)) => Ok(CSource::Bus(*idx)),
                Some(Symbol::Control(idx)) => Ok(CSource::Control(*idx)),
                None => Err(unknown_ref(name, line)),
            },
        }
    }

    fn resolve_stage(&mut self, stage: &Stage, line: usize) -> Result<CStage, CompileError> {
        match stage {
            Stage::Mul(a) => Ok(CStage::Mul(self.resolve_arg(a, line)?)),
            Stage::Add(a) => Ok(CStage::Add(self.resolve_arg(a, line)?)),
            Stage::LowPass { cutoff, q } => {
                let cutoff = self.resolve_arg(cutoff, line)?;
                let q = self.resolve_arg(q, line)?;
                let state = self.state.filters as u16;
                self.state.filters += 1;
                Ok(CStage::LowPass { cutoff, q, state })
            }
            Stage::HighPass { cutoff, q } => {
                let cutoff = self.resolve_arg(cutoff, line)?;
                let q = self.resolve_arg(q, line)?;
                let state = self.state.filters as u16;
                self.state.filters += 1;
                Ok(CStage::HighPass { cutoff, q, state })
            }
            Stage::Delay { time, feedback } => {
                let time = self.resolve_arg(time, line)?;
                let feedback = self.resolve_arg(feedback, line)?;
                let dline = self.state.delays as u16;
                self.state.delays += 1;
                Ok(CStage::Delay {
                    time,
                    feedback,
                    line: dline,
                })
            }
            Stage::Clip { lo, hi } => Ok(CStage::Clip {
                lo: self.resolve_arg(lo, line)?,
                hi: self.resolve_arg(hi, line)?,
            }),
            Stage::Meter(def) => {
                let control = self.push_control(def.clone(), line)?;
                self.meters.push(control);
                Ok(CStage::Meter { control })
            }
        }
    }

    fn resolve_expr(&mut self, expr: &Expr, line: usize) -> Result<CExpr, CompileError> {
        match expr {
            Expr::Chain(chain) => {
                let source = self.resolve_source(&chain.source, line)?;
                let mut stages = Vec::with_capacity(chain.stages.len());
                for stage in &chain.stages {
                    stages.push(self.resolve_stage(stage, line)?);
                }
                Ok(CExpr::Chain(CChain { source, stages }))
            }
            Expr::Sum(a, b) => Ok(CExpr::Sum(
                Box::new(self.resolve_expr(a, line)?),
                Box::new(self.resolve_expr(b, line)?),
            )),
        }
    }

    fn push_control(&mut self, def: ControlDef, line: usize) -> Result<u16, CompileError> {
        if def.min > def.max {
            return Err(CompileError::at(
                line,
                1,
                format!(
                    "control \"{}\" has min {} greater than max {}",
                    def.label, def.min, def.max
                ),
            ));
        }
        if def.init < def.min || def.init > def.max {
            return Err(CompileError::at(
                line,
                1,
                format!(
                    "control \"{}\" default {} lies outside [{}, {}]",
                    def.label, def.init, def.min, def.max
                ),
            ));
        }
        let idx = self.controls.len() as u16;
        self.controls.push(def);
        Ok(idx)
    }
}

fn unknown_ref(name: &str, line: usize) -> CompileError {
    CompileError::at(line, 1, format!("unknown reference ~{name}"))
        .with_hint(format!("declare ~{name} on an earlier line"))
}

/// Resolve references, collect controls, and bind state slots.
pub fn check(def: &ProgramDef) -> Result<CheckedProgram, CompileError> {
    let mut checker = Checker::new();
    let mut statements = Vec::new();
    let mut num_outputs: Option<usize> = None;

    for statement in &def.statements {
        match statement {
            Statement::Control { name, def, line } => {
                if checker.symbols.contains_key(name) {
                    return Err(duplicate(name, *line));
                }
                let idx = checker.push_control(def.clone(), *line)?;
                checker.symbols.insert(name.clone(), Symbol::Control(idx));
            }
            Statement::Bus { name, expr, line } => {
                if checker.symbols.contains_key(name) {
                    return Err(duplicate(name, *line));
                }
                // Resolve before registering the name: a bus cannot feed itself.
                let cexpr = checker.resolve_expr(expr, *line)?;
                let idx = checker.num_buses;
                checker.num_buses += 1;
                checker.symbols.insert(name.clone(), Symbol::Bus(idx));
                statements.push(CStatement {
                    target: Target::Bus(idx),
                    expr: cexpr,
                });
            }
            Statement::Output { chains, line } => {
                if num_outputs.is_some() {
                    return Err(CompileError::at(*line, 1, "output already declared")
                        .with_hint("a program has exactly one 'out:' line"));
                }
                for (channel, expr) in chains.iter().enumerate() {
                    let cexpr = checker.resolve_expr(expr, *line)?;
                    statements.push(CStatement {
                        target: Target::Output(channel as u16),
                        expr: cexpr,
                    });
                }
                num_outputs = Some(chains.len());
            }
        }
    }

    let num_outputs = num_outputs.ok_or_else(|| {
        CompileError::new("program declares no output")
            .with_hint("add an 'out:' line, e.g. out: sin 440 >> mul 0.5")
    })?;

    Ok(CheckedProgram {
        meta: ProgramMeta {
            controls: checker.controls,
            meters: checker.meters,
            num_inputs: checker.max_input.map_or(0, |m| m + 1),
            num_outputs,
            num_buses: checker.num_buses as usize,
            state: checker.state,
        },
        statements,
    })
}

fn duplicate(name: &str, line: usize) -> CompileError {
    CompileError::at(line, 1, format!("~{name} is declared twice"))
}
