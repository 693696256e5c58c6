//! Binary entry point: parses CLI arguments, loads the process-descriptor
//! file, wires up logging, runs the simulator against real spawned workers,
//! and reports fatal errors with a single stderr line and a non-zero exit,
//! leaving whatever transcript already reached stdout standing.

mod args;
mod loader;

use std::io;
use std::process::ExitCode;

use clap::Parser;

use args::Args;
use procman_sim::Engine;
use procman_worker::ChildWorker;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("fatal: {err}");
            eprintln!("procman: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Loader(#[from] loader::LoaderError),
    #[error(transparent)]
    Sim(#[from] procman_sim::SimError),
}

fn run(args: Args) -> Result<(), CliError> {
    let descriptors = loader::load(&args.file)?;
    log::info!("loaded {} process descriptors from {:?}", descriptors.len(), args.file);

    let mut engine: Engine<ChildWorker> = Engine::new(
        descriptors,
        args.scheduler.into(),
        args.memory.into(),
        args.quantum,
        args.total_memory,
    );

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let metrics = engine.run(&mut handle)?;
    log::info!("run complete: makespan={}", metrics.makespan);
    Ok(())
}
