//! CLI tool compiling a script into a datapack
//!
//! Usage: datajs [options] <input.js>
//!
//! Writes one `.mcfunction` file per unit under `<out>/data/<ns>/function/`,
//! or the instruction IR as JSON. `--run` executes the program in the
//! simulator instead and prints what it logged.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use datajs::{Machine, Options, Program, compile, dialect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Emit {
    /// One function file per unit
    Mcfunction,
    /// The instruction IR
    Json,
}

#[derive(Parser)]
#[command(name = "datajs")]
#[command(about = "Compile a JavaScript subset into datapack functions", long_about = None)]
#[command(version)]
struct Cli {
    /// Script to compile
    input: PathBuf,

    /// Namespace of the generated functions and storages
    #[arg(short, long)]
    namespace: Option<String>,

    /// Output directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Options file (defaults to datajs.toml next to the input when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Compile without the built-in globals
    #[arg(long)]
    no_prelude: bool,

    #[arg(long, value_enum, default_value_t = Emit::Mcfunction)]
    emit: Emit,

    /// Run the program in the simulator and print its output
    #[arg(long)]
    run: bool,

    /// Ticks to simulate after the entry unit when running
    #[arg(long, default_value_t = 0, requires = "run")]
    ticks: u64,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let options = load_options(cli)?;
    let source = fs::read_to_string(&cli.input)
        .map_err(|e| format!("Failed to read {}: {}", cli.input.display(), e))?;

    let compilation = compile(&source, &options);
    let program = compilation.into_result().map_err(|diagnostics| {
        let listed = diagnostics
            .iter()
            .map(|e| format!("  {}", e.clone().with_file(cli.input.clone())))
            .collect::<Vec<_>>()
            .join("\n");
        format!("compilation failed with {} error(s)\n{}", diagnostics.len(), listed)
    })?;
    info!(units = program.units.len(), "compiled {}", cli.input.display());

    if cli.run {
        return simulate(program, cli.ticks);
    }

    match cli.emit {
        Emit::Json => {
            let json = program.to_json().map_err(|e| e.to_string())?;
            write_file(&options.output.join(format!("{}.json", program.namespace)), &json)
        }
        Emit::Mcfunction => {
            for artifact in dialect::render(&program) {
                write_file(&options.output.join(&artifact.path), &artifact.contents)?;
            }
            Ok(())
        }
    }
}

/// Options file first, then command-line overrides
fn load_options(cli: &Cli) -> Result<Options, String> {
    let config = cli.config.clone().or_else(|| {
        let candidate = cli
            .input
            .parent()
            .unwrap_or(Path::new("."))
            .join("datajs.toml");
        candidate.exists().then_some(candidate)
    });

    let mut options = match config {
        Some(path) => Options::from_file(&path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => Options::default(),
    };
    if let Some(namespace) = &cli.namespace {
        options.namespace = namespace.clone();
    }
    if let Some(out) = &cli.out {
        options.output = out.clone();
    }
    if cli.no_prelude {
        options.prelude = false;
    }
    options.validate().map_err(|e| e.to_string())?;
    Ok(options)
}

fn simulate(program: Program, ticks: u64) -> Result<(), String> {
    let mut machine = Machine::new(program);
    machine.run_entry().map_err(|e| e.to_string())?;
    machine.advance_ticks(ticks).map_err(|e| e.to_string())?;
    for line in machine.output() {
        println!("{}", line);
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    fs::write(path, contents).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}
