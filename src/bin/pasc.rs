//! Reference CLI for `paserati`: a `clap`-derive `Cli` with
//! `run`/`build`/`disasm` subcommands instead of plain boolean flags,
//! since `build` and `disasm` need different output (a chunk dump vs.
//! a disassembly listing) rather than just "did or didn't run".

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use paserati::diagnostics::Config;
use paserati::PipelineError;

/// Exit codes: 0 success, 1 syntax error, 2 type error, 3 compile
/// error, 4 runtime error.
fn exit_code_for(err: &PipelineError) -> ExitCode {
    match err {
        PipelineError::Syntax(_) => ExitCode::from(1),
        PipelineError::Type(_) => ExitCode::from(2),
        PipelineError::Compile(_) => ExitCode::from(3),
        PipelineError::Runtime(_) => ExitCode::from(4),
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check, compile, and execute a source file.
    Run {
        file: PathBuf,

        #[arg(long)]
        debug_ast: bool,

        #[arg(long)]
        debug_bytecode: bool,

        #[arg(long)]
        step_budget: Option<u64>,

        #[arg(long)]
        max_call_depth: Option<usize>,
    },
    /// Check and compile a source file without executing it.
    Build {
        file: PathBuf,

        #[arg(long)]
        debug_ast: bool,

        /// Print a JSON bytecode summary instead of the plain-text one.
        #[arg(long)]
        json: bool,
    },
    /// Check, compile, and print the disassembly of a source file.
    Disasm { file: PathBuf },
}

fn main() -> ExitCode {
    simple_logger::init_with_level(log::Level::Warn).unwrap();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            file,
            debug_ast,
            debug_bytecode,
            step_budget,
            max_call_depth,
        } => {
            let mut config = Config {
                debug_ast,
                debug_bytecode,
                step_budget,
                ..Config::default()
            };
            if let Some(depth) = max_call_depth {
                config.max_call_depth = depth;
            }
            run_file(&file, &config)
        }
        Command::Build { file, debug_ast, json } => build_file(
            &file,
            &Config {
                debug_ast,
                ..Config::default()
            },
            json,
        ),
        Command::Disasm { file } => disasm_file(&file),
    }
}

fn read_source(file: &PathBuf) -> Result<String, ExitCode> {
    std::fs::read_to_string(file).map_err(|e| {
        error!("could not read file '{}': {e}", file.display());
        ExitCode::FAILURE
    })
}

fn run_file(file: &PathBuf, config: &Config) -> ExitCode {
    let source = match read_source(file) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match paserati::run_source(&source, config) {
        Ok(value) => {
            println!("{}", value.display_string());
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = exit_code_for(&e);
            error!("{e}");
            code
        }
    }
}

fn build_file(file: &PathBuf, config: &Config, json: bool) -> ExitCode {
    let source = match read_source(file) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match paserati::compile_source(&source, config) {
        Ok(proto) => {
            if json {
                match serde_json::to_string_pretty(&proto.summary()) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        error!("failed to serialize bytecode summary: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                println!(
                    "compiled '{}': {} top-level register(s), {} constant(s)",
                    file.display(),
                    proto.frame_size,
                    proto.chunk.constants.len()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = exit_code_for(&e);
            error!("{e}");
            code
        }
    }
}

fn disasm_file(file: &PathBuf) -> ExitCode {
    let source = match read_source(file) {
        Ok(s) => s,
        Err(code) => return code,
    };
    match paserati::compile_source(&source, &Config::default()) {
        Ok(proto) => {
            print!("{}", proto.chunk.disassemble("<script>"));
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = exit_code_for(&e);
            error!("{e}");
            code
        }
    }
}
