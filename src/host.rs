//! Program host: lifecycle, swap protocol, introspection surface
//!
//! Owns the triple (parameter interface, runtime instance, compiled unit)
//! and replaces it as a unit. `compile` builds the complete replacement off
//! the audio path before a single-assignment commit makes it live, so a
//! failed compile leaves the running program untouched and a successful one
//! never exposes a half-constructed state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::diagnostics::CompileError;
use crate::factory::{self, Backend, ProgramFactory};
use crate::instance::RuntimeInstance;
use crate::live::LiveParams;
use crate::params::{ParamSpec, Params};

/// Structured result of a successful compile, for the caller to surface
/// however it likes.
#[derive(Debug, Clone)]
pub struct CompileReport {
    pub param_count: usize,
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub elapsed: Duration,
}

/// The program triple.
///
/// Field order is the release order: interface first, then the instance,
/// then the compiled unit. The instance additionally shares the unit's
/// image via `Arc`, so even a future field reorder could not free an image
/// that is still executable. The declared order keeps teardown
/// deterministic and matches construction in reverse.
struct LoadedProgram {
    params: Arc<Params>,
    instance: RuntimeInstance,
    factory: ProgramFactory,
}

impl Drop for LoadedProgram {
    fn drop(&mut self) {
        debug!("retiring program triple");
    }
}

/// Lifecycle and introspection manager for one dynamically compiled
/// signal-processing program.
pub struct ProgramHost {
    backend: Backend,
    sample_rate: u32,
    live: Option<LoadedProgram>,
    view: LiveParams,
}

impl ProgramHost {
    /// Backend and sample rate are fixed for the host's lifetime.
    pub fn new(backend: Backend, sample_rate: u32) -> Self {
        assert!(sample_rate > 0, "sample rate must be positive");
        Self {
            backend,
            sample_rate,
            live: None,
            view: LiveParams::new(),
        }
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Whether a usable program is loaded. Side-effect free; the audio
    /// thread owner polls this to decide between `compute` and passthrough.
    pub fn is_ready(&self) -> bool {
        self.live.is_some()
    }

    /// Compile `source` and, on success, swap the running program for it.
    ///
    /// The sole mutating entry point for program state. On failure the
    /// previous program (if any) remains installed and fully usable.
    pub fn compile(&mut self, source: &str) -> Result<CompileReport, CompileError> {
        let started = Instant::now();
        debug!(backend = ?self.backend, "compiling program");

        let factory = match factory::compile_source(source, self.backend) {
            Ok(factory) => factory,
            Err(err) => {
                warn!(line = err.line, "compile failed: {}", err.message);
                return Err(err);
            }
        };

        let instance = factory.instantiate(self.sample_rate);
        let params = Arc::new(instance.build_params());
        let report = CompileReport {
            param_count: params.len(),
            num_inputs: instance.num_inputs(),
            num_outputs: instance.num_outputs(),
            elapsed: started.elapsed(),
        };

        self.install(LoadedProgram {
            params,
            instance,
            factory,
        });

        info!(
            params = report.param_count,
            inputs = report.num_inputs,
            outputs = report.num_outputs,
            elapsed_us = report.elapsed.as_micros() as u64,
            "program installed"
        );
        Ok(report)
    }

    /// Commit a fully built replacement triple. The swap itself is one
    /// assignment; the retired triple is released only after the new one is
    /// live and published.
    fn install(&mut self, next: LoadedProgram) {
        let published = next.params.clone();
        let retired = self.live.replace(next);
        self.view.publish(Some(published));
        drop(retired);
    }

    /// Process one block. With no program loaded this writes silence, so a
    /// caller that skipped the `is_ready` gate still gets defined behavior.
    pub fn compute(&mut self, frames: usize, inputs: &[&[f32]], outputs: &mut [&mut [f32]]) {
        match &mut self.live {
            Some(program) => program.instance.compute(frames, inputs, outputs),
            None => {
                for out in outputs.iter_mut() {
                    let n = frames.min(out.len());
                    for sample in &mut out[..n] {
                        *sample = 0.0;
                    }
                }
            }
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.live.as_ref().map_or(0, |p| p.instance.num_inputs())
    }

    pub fn num_outputs(&self) -> usize {
        self.live.as_ref().map_or(0, |p| p.instance.num_outputs())
    }

    /// Number of declared parameters; 0 with no program loaded.
    pub fn param_count(&self) -> usize {
        self.live.as_ref().map_or(0, |p| p.params.len())
    }

    /// Metadata (kind, range, default, label) for one parameter.
    pub fn param(&self, index: usize) -> Option<&ParamSpec> {
        self.live.as_ref().and_then(|p| p.params.spec(index))
    }

    /// Current value of a parameter as a [0, 1] ratio; 0.0 when the index is
    /// out of range or no program is loaded.
    pub fn value(&self, index: usize) -> f32 {
        self.live.as_ref().map_or(0.0, |p| p.params.value(index))
    }

    /// Write a normalized parameter value; silently ignored when out of
    /// range or with no program loaded.
    pub fn set_value(&self, index: usize, ratio: f32) {
        if let Some(program) = &self.live {
            program.params.set_value(index, ratio);
        }
    }

    /// Handle for UI/control threads; survives program swaps and host
    /// teardown (readers go neutral once unpublished).
    pub fn live_params(&self) -> LiveParams {
        self.view.clone()
    }
}

impl Drop for ProgramHost {
    fn drop(&mut self) {
        self.view.publish(None);
    }
}
