//! # soliton: host for dynamically compiled signal-processing programs
//!
//! soliton manages the lifecycle of a small audio DSL program: compile
//! source text through a selectable backend, instantiate the result at a
//! fixed sample rate, expose its declared control parameters for UI binding,
//! and drive per-block audio computation on a real-time-safe path.
//!
//! ## Core ideas
//!
//! - **One triple, swapped as a unit.** A program is (parameter interface,
//!   runtime instance, compiled unit). [`ProgramHost::compile`] builds the
//!   complete replacement before a single commit makes it live; a failed
//!   compile leaves the running program untouched.
//! - **Two backends, one behavior.** [`Backend::Compiled`] lowers to a flat
//!   op list executed in a tight loop; [`Backend::Interpreted`] walks the
//!   checked tree. Identical source yields identical parameters, channel
//!   counts, and audio.
//! - **Lock-free control.** Parameter values live in atomic cells shared
//!   between the instance and every interface handle; UI threads read and
//!   write normalized ratios without ever blocking the audio thread, and
//!   [`ProgramHost::live_params`] hands out a swap-tolerant view.
//!
//! ## Quick start
//!
//! ```
//! use soliton::{Backend, ProgramHost};
//!
//! let mut host = ProgramHost::new(Backend::Compiled, 44_100);
//! host.compile(
//!     r#"
//! ~gain: slider "Gain" 0.5 0.0 1.0
//! out: sin 440 >> mul ~gain
//! "#,
//! )
//! .expect("valid program");
//!
//! assert!(host.is_ready());
//! assert_eq!(host.param_count(), 1);
//!
//! let mut left = vec![0.0f32; 64];
//! let mut outputs: Vec<&mut [f32]> = vec![&mut left];
//! host.compute(64, &[], &mut outputs);
//! ```
//!
//! ## The language
//!
//! Line-oriented: `~name:` declares a control (`slider`, `vslider`,
//! `nentry`, `button`, `checkbox`) or a signal bus; `out:` lists one chain
//! per output channel. Chains link a generator (`sin`, `saw`, `square`,
//! `tri`, `noise`, `in <ch>`, a constant, or a `~ref`) through `>>` stages
//! (`mul`, `add`, `lpf`, `hpf`, `delay`, `clip`, `meter`), and `+` mixes two
//! chains. Parameter order is declaration order in source.

pub mod diagnostics;
pub mod dsp;
pub mod factory;
pub mod host;
pub mod instance;
pub mod interp;
pub mod live;
pub mod opcode;
pub mod params;
pub mod parser;
pub mod program;
pub mod render;

pub use diagnostics::CompileError;
pub use factory::{compile_source, Backend, ProgramFactory, ProgramImage};
pub use host::{CompileReport, ProgramHost};
pub use instance::RuntimeInstance;
pub use live::LiveParams;
pub use params::{ParamKind, ParamSpec, Params};
