//! # Pool Inspector
//!
//! Replays a small allocation session against a multi-pool and prints
//! the chunk occupancy after every step.
//!
//! Run with: `cargo run --bin pool_inspect -- --chunks 10`
//! Set `RUST_LOG=chunk_pool_core=trace` to see every allocation.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use chunk_pool_core::{MultiPool, PoolConfig, PoolResult};
use tracing_subscriber::EnvFilter;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "pool_inspect", version, about = "Inspect chunk pool occupancy")]
struct Cli {
    /// Path to a TOML pool configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial pool capacity in chunks (overrides the config)
    #[arg(long)]
    chunks: Option<usize>,

    /// Number of `i32` elements per demo allocation
    #[arg(long, default_value_t = 10)]
    elements: usize,
}

fn print_state(step: &str, pool: &MultiPool) {
    println!("== {step}");
    println!("{pool}");
    println!(
        "   allocations={} allocated={} free={} fragments={} total={} chunk_size={}",
        pool.allocation_count(),
        pool.allocated_chunks(),
        pool.free_chunks(),
        pool.free_fragments(),
        pool.total_chunks(),
        pool.chunk_size()
    );
}

fn run(cli: &Cli) -> PoolResult<()> {
    let mut config = match &cli.config {
        Some(path) => PoolConfig::from_toml_file(path)?,
        None => PoolConfig::default(),
    };
    if let Some(chunks) = cli.chunks {
        config.initial_chunks = chunks;
    }

    let mut pool = MultiPool::from_config(&config)?;
    print_state("new pool", &pool);

    let a = pool.allocate_view::<i32>(cli.elements)?;
    {
        let values = pool.view_mut(&a)?;
        for (value, pattern) in values.iter_mut().zip([69, 0xdead, 0xcafe, 0xbeef]) {
            *value = pattern;
        }
    }
    print_state("allocated view a", &pool);
    println!("   a[..4] = {:x?}", &pool.view(&a)?[..a.len().min(4)]);

    let b = pool.allocate_view::<i32>(cli.elements)?;
    print_state("allocated view b", &pool);

    pool.deallocate_view(a);
    print_state("freed view a", &pool);

    pool.deallocate_view(b);
    print_state("freed view b", &pool);

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("pool_inspect failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
