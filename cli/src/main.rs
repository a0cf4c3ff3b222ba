use anyhow::{Context, Result};
use clap::Parser;
use rv32_pipe_core::harness::{FlatBus, Image};
use rv32_pipe_core::utils::{mem_diff, mem_print};
use rv32_pipe_core::{CpuConfig, CpuSim};

/// RV32IA + Zicsr + Sv32 pipeline simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, arg_required_else_help = true)]
struct Args {
    /// Path to a raw memory image (instruction words, little-endian, placed at address 0)
    input: String,

    /// Number of cycles to run
    #[arg(short = 'c', long, default_value_t = 1000)]
    cycles: u64,

    /// Reset vector (PC after reset)
    #[arg(long, default_value_t = 0)]
    reset_vector: u32,

    /// Disable Sv32 virtual memory translation
    #[arg(long)]
    no_sv32: bool,

    /// Disable the M extension (MUL/DIV/REM)
    #[arg(long)]
    no_m_extension: bool,

    /// Print the full final memory image instead of just the diff
    #[arg(long)]
    dump_mem: bool,

    /// Print logs during simulation
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging_setup(args.verbose);

    let bytes = std::fs::read(&args.input).with_context(|| format!("could not read file `{}`", &args.input))?;
    let before = {
        let mut buf = vec![0u8; rv32_pipe_core::framework::MEM_SIZE];
        let len = bytes.len().min(buf.len());
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    };

    let config = CpuConfig::new()
        .with_reset_vector(args.reset_vector)
        .with_sv32(!args.no_sv32)
        .with_m_extension(!args.no_m_extension);
    let mut bus = FlatBus::new(Image::from_bytes(bytes), config);

    for _ in 0..args.cycles {
        bus.step();
    }

    println!("ran {} cycles, final pc = {:#010x}", args.cycles, bus.sim().program_counter());
    for (reg, val) in bus.sim().registers() {
        if val != 0 {
            println!("  x{reg:<2} = {val:#010x}");
        }
    }

    let after = bus.sim().units().memory.snapshot();
    if args.dump_mem {
        mem_print(&after);
    } else {
        mem_diff(before.as_slice().try_into().expect("image sized to MEM_SIZE"), &after);
    }

    Ok(())
}

fn logging_setup(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false).without_time())
        .with(filter)
        .init();
}
