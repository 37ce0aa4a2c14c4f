//! soliton CLI - render programs offline and inspect their parameters

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use soliton::render::{RenderConfig, Renderer};
use soliton::{Backend, ProgramHost};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Compiled,
    Interpreted,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Compiled => Backend::Compiled,
            BackendArg::Interpreted => Backend::Interpreted,
        }
    }
}

#[derive(Parser)]
#[command(name = "soliton")]
#[command(about = "Host for dynamically compiled signal-processing programs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a program to WAV
    Render {
        /// Input file (.sol or .dsl) or inline program code
        input: String,

        /// Output WAV file path
        output: PathBuf,

        /// Duration in seconds
        #[arg(short, long, default_value = "4.0")]
        duration: f32,

        /// Sample rate in Hz
        #[arg(short = 'r', long, default_value = "44100")]
        sample_rate: u32,

        /// Master gain applied to the rendered audio
        #[arg(short, long, default_value = "1.0")]
        gain: f32,

        /// Block size for processing
        #[arg(short, long, default_value = "512")]
        block_size: usize,

        /// Compilation backend
        #[arg(long, value_enum, default_value = "compiled")]
        backend: BackendArg,
    },

    /// Compile a program and print the parameter table a UI would bind
    Params {
        /// Input file (.sol or .dsl) or inline program code
        input: String,

        /// Sample rate in Hz
        #[arg(short = 'r', long, default_value = "44100")]
        sample_rate: u32,

        /// Compilation backend
        #[arg(long, value_enum, default_value = "compiled")]
        backend: BackendArg,
    },
}

fn read_source(input: &str) -> Result<String, String> {
    if input.ends_with(".sol") || input.ends_with(".dsl") {
        fs::read_to_string(input).map_err(|e| format!("Failed to read file {input}: {e}"))
    } else {
        Ok(input.to_string())
    }
}

fn run_render(
    input: &str,
    output: &PathBuf,
    duration: f32,
    sample_rate: u32,
    gain: f32,
    block_size: usize,
    backend: Backend,
) -> Result<(), String> {
    let source = read_source(input)?;
    let config = RenderConfig {
        sample_rate,
        block_size,
        duration,
        master_gain: gain,
    };

    println!("Rendering to {}", output.display());
    println!("  Duration:    {duration} seconds");
    println!("  Sample rate: {sample_rate} Hz");
    println!();

    let stats = Renderer::new(config).render_to_file(&source, backend, output)?;
    stats.print_summary();
    println!("\nRender complete: {}", output.display());
    Ok(())
}

fn run_params(input: &str, sample_rate: u32, backend: Backend) -> Result<(), String> {
    let source = read_source(input)?;
    let mut host = ProgramHost::new(backend, sample_rate);
    let report = host.compile(&source).map_err(|e| e.to_string())?;

    println!(
        "Compiled in {:.2} ms ({} in, {} out)",
        report.elapsed.as_secs_f64() * 1000.0,
        report.num_inputs,
        report.num_outputs
    );
    println!();
    println!("{:>3}  {:<12} {:<20} {:>10} {:>10} {:>10}", "#", "kind", "label", "min", "max", "default");

    for index in 0..host.param_count() {
        if let Some(spec) = host.param(index) {
            println!(
                "{:>3}  {:<12} {:<20} {:>10} {:>10} {:>10}",
                index,
                format!("{:?}", spec.kind),
                spec.label,
                spec.min,
                spec.max,
                spec.init
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Render {
            input,
            output,
            duration,
            sample_rate,
            gain,
            block_size,
            backend,
        } => run_render(
            &input,
            &output,
            duration,
            sample_rate,
            gain,
            block_size,
            backend.into(),
        ),
        Commands::Params {
            input,
            sample_rate,
            backend,
        } => run_params(&input, sample_rate, backend.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}
