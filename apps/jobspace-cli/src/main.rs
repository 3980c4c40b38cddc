use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use glam::Vec3;
use jobspace_common::{EntityId, SeededRng, Transform, transforms_hash};
use jobspace_executor::{Executor, ExecutorConfig, ParallelFor};
use jobspace_scratch::ScratchArena;
use jobspace_targets::{TargetSet, scatter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobspace-cli", about = "Demo driver for the jobspace bulk parallel-map engine")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Worker pool size (overrides --config; default: available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Executor config as JSON, e.g. {"workers": 4}
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Write value1 + value2 into every slot of a scratch buffer
    Fill {
        /// Number of slots
        #[arg(short, long, default_value = "1000")]
        count: usize,
        #[arg(long, default_value = "10")]
        value1: i64,
        #[arg(long, default_value = "20")]
        value2: i64,
        /// Indices per chunk (default: one chunk for the whole range)
        #[arg(short, long)]
        granularity: Option<usize>,
        /// Run the plain loop instead of submitting to the executor
        #[arg(long)]
        serial: bool,
    },
    /// Elementwise sum of two scratch buffers into a third
    Sum {
        #[arg(short, long, default_value = "1000")]
        count: usize,
        /// Indices per chunk
        #[arg(short, long, default_value = "1")]
        granularity: usize,
        /// Run the plain loop instead of submitting to the executor
        #[arg(long)]
        serial: bool,
    },
    /// Write seeded random positions into a transform target set, on both
    /// the serial and scheduled paths, and compare state hashes
    Scatter {
        #[arg(short, long, default_value = "1000")]
        count: usize,
        /// Indices per chunk
        #[arg(short, long, default_value = "64")]
        granularity: usize,
        /// RNG seed; the same seed reproduces the same positions
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    if let Commands::Info = cli.command {
        println!("jobspace-cli v{}", env!("CARGO_PKG_VERSION"));
        println!("common:   {}", jobspace_common::crate_info());
        println!("scratch:  {}", jobspace_scratch::crate_info());
        println!("executor: {}", jobspace_executor::crate_info());
        println!("targets:  {}", jobspace_targets::crate_info());
        return Ok(());
    }

    let executor = Executor::new(load_config(&cli)?)?;
    println!("workers: {}", executor.worker_count());

    match cli.command {
        Commands::Info => unreachable!("handled above"),
        Commands::Fill {
            count,
            value1,
            value2,
            granularity,
            serial,
        } => run_fill(&executor, count, value1, value2, granularity, serial),
        Commands::Sum {
            count,
            granularity,
            serial,
        } => run_sum(&executor, count, granularity, serial),
        Commands::Scatter {
            count,
            granularity,
            seed,
        } => run_scatter(&executor, count, granularity, seed),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ExecutorConfig> {
    let mut config: ExecutorConfig = match &cli.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => ExecutorConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    Ok(config)
}

/// Every slot gets `value1 + value2`: the single-job fill pattern.
fn run_fill(
    executor: &Executor,
    count: usize,
    value1: i64,
    value2: i64,
    granularity: Option<usize>,
    serial: bool,
) -> anyhow::Result<()> {
    let arena = ScratchArena::new();
    let result = arena.allocate::<i64>(count)?;

    if serial {
        for i in 0..count {
            result.set(i, value1 + value2);
        }
    } else {
        let desc = match granularity {
            Some(g) => ParallelFor::new(count, g)?,
            None => ParallelFor::single_chunk(count),
        };
        let out = result.clone();
        let handle = executor.submit(desc, move |i| {
            out.set(i, value1 + value2);
            Ok(())
        })?;
        handle.wait().into_result()?;
    }

    let expected = value1 + value2;
    let ok = (0..count).all(|i| result.get(i) == expected);
    println!(
        "fill: count={count}, expected={expected}, path={}, verified={}",
        if serial { "serial" } else { "scheduled" },
        if ok { "OK" } else { "MISMATCH" }
    );
    arena.release(result)?;
    Ok(())
}

/// `result[i] = value1[i] + value2[i]` with `value1[i] = value2[i] = i`.
fn run_sum(
    executor: &Executor,
    count: usize,
    granularity: usize,
    serial: bool,
) -> anyhow::Result<()> {
    let arena = ScratchArena::new();
    let value1 = arena.allocate::<u64>(count)?;
    let value2 = arena.allocate::<u64>(count)?;
    let result = arena.allocate::<u64>(count)?;

    for i in 0..count {
        value1.set(i, i as u64);
        value2.set(i, i as u64);
    }

    if serial {
        for i in 0..count {
            result.set(i, value1.get(i) + value2.get(i));
        }
    } else {
        let (a, b, out) = (value1.clone(), value2.clone(), result.clone());
        let handle = executor.submit(ParallelFor::new(count, granularity)?, move |i| {
            out.set(i, a.get(i) + b.get(i));
            Ok(())
        })?;
        handle.wait().into_result()?;
    }

    let ok = (0..count).all(|i| result.get(i) == 2 * i as u64);
    println!(
        "sum: count={count}, granularity={granularity}, path={}, verified={}",
        if serial { "serial" } else { "scheduled" },
        if ok { "OK" } else { "MISMATCH" }
    );
    arena.release(value1)?;
    arena.release(value2)?;
    arena.release(result)?;
    Ok(())
}

fn random_position(seed: u64, index: usize) -> Vec3 {
    let mut rng = SeededRng::for_index(seed, index);
    Vec3::new(
        rng.range_f32(-15.0, 15.0),
        rng.range_f32(-15.0, 15.0),
        rng.range_f32(-15.0, 15.0),
    )
}

/// Stand-in for the host's instantiation facility: spawn `count` prefab
/// instances, each an identity transform owned by a fresh entity.
fn spawn_instances(count: usize) -> Vec<(EntityId, Transform)> {
    (0..count)
        .map(|_| (EntityId::new(), Transform::default()))
        .collect()
}

/// Seeded random positions into a transform target set, serial vs scheduled.
fn run_scatter(
    executor: &Executor,
    count: usize,
    granularity: usize,
    seed: u64,
) -> anyhow::Result<()> {
    // Host side: instantiate prefabs, then hand their transforms to the
    // adapter. Ids stay with the host; index i addresses instance i.
    let (ids, transforms): (Vec<EntityId>, Vec<Transform>) =
        spawn_instances(count).into_iter().unzip();

    // Serial path: plain indexed loop over the transforms.
    let mut serial = transforms.clone();
    for (i, t) in serial.iter_mut().enumerate() {
        *t = Transform::at(random_position(seed, i));
    }
    let serial_hash = transforms_hash(&serial);

    // Scheduled path: same positions through the target-set adapter.
    let set = TargetSet::from_vec(transforms);
    let handle = scatter(executor, &set, granularity, move |i| {
        Ok(Transform::at(random_position(seed, i)))
    })?;
    handle.wait().into_result()?;
    let scheduled = set
        .into_inner()
        .map_err(|_| anyhow!("target set still in use after wait"))?;
    let scheduled_hash = transforms_hash(&scheduled);

    println!(
        "scatter: instances={}, granularity={granularity}, seed={seed}, \
         serial={serial_hash:#x}, scheduled={scheduled_hash:#x}, match={}",
        ids.len(),
        if serial_hash == scheduled_hash { "OK" } else { "MISMATCH" }
    );
    if let (Some(id), Some(t)) = (ids.first(), scheduled.first()) {
        tracing::debug!(id = %id.0, position = ?t.position, "first instance");
    }
    Ok(())
}
