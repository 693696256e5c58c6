use clap::{Parser, ValueEnum};

use procman_memory::DEFAULT_CAPACITY;
use procman_sim::{MemoryMode, Policy};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    Sjf,
    Rr,
}

impl From<PolicyArg> for Policy {
    fn from(p: PolicyArg) -> Policy {
        match p {
            PolicyArg::Sjf => Policy::Sjf,
            PolicyArg::Rr => Policy::Rr,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MemoryModeArg {
    Infinite,
    #[value(name = "best-fit")]
    BestFit,
}

impl From<MemoryModeArg> for MemoryMode {
    fn from(m: MemoryModeArg) -> MemoryMode {
        match m {
            MemoryModeArg::Infinite => MemoryMode::Infinite,
            MemoryModeArg::BestFit => MemoryMode::BestFit,
        }
    }
}

/// Discrete-time process manager simulator.
#[derive(Debug, Parser)]
#[command(name = "procman", version, about)]
pub struct Args {
    /// Process-descriptor file: one process per line, `<arrival_time> <name> <service_time> <memory_size>`.
    #[arg(short = 'f', long = "file")]
    pub file: std::path::PathBuf,

    /// Scheduling policy.
    #[arg(short = 's', long = "scheduler", value_enum)]
    pub scheduler: PolicyArg,

    /// Memory allocation mode.
    #[arg(short = 'm', long = "memory", value_enum)]
    pub memory: MemoryModeArg,

    /// Quantum length, in simulated seconds.
    #[arg(short = 'q', long = "quantum", value_parser = parse_quantum)]
    pub quantum: u32,

    /// Total arena capacity in megabytes, used only in best-fit mode.
    #[arg(long = "total-memory", default_value_t = DEFAULT_CAPACITY)]
    pub total_memory: u16,

    /// Raise diagnostic verbosity (-v, -vv). Never affects the transcript.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_quantum(s: &str) -> Result<u32, String> {
    match s.parse::<u32>() {
        Ok(q) if (1..=3).contains(&q) => Ok(q),
        Ok(q) => Err(format!("quantum must be 1, 2, or 3 (got {q})")),
        Err(_) => Err(format!("'{s}' is not a valid quantum")),
    }
}
